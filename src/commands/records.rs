// 记录类命令
// 题目、笔记与代码片段的增删改查

use crate::models::{
    Note, NoteDraft, NotePatch, Problem, ProblemDraft, ProblemPatch, Snippet, SnippetDraft,
    SnippetPatch,
};
use crate::services::AppServices;
use tauri::{AppHandle, State};
use tauri_plugin_shell::ShellExt;

// ==================== 题目 ====================

#[tauri::command]
pub async fn list_problems(state: State<'_, AppServices>) -> Result<Vec<Problem>, String> {
    let problems = state.problems().map_err(|e| e.to_string())?;
    Ok(problems.all().to_vec())
}

#[tauri::command]
pub async fn add_problem(
    draft: ProblemDraft,
    state: State<'_, AppServices>,
) -> Result<Problem, String> {
    let mut problems = state.problems().map_err(|e| e.to_string())?;
    problems.add(draft).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn update_problem(
    id: String,
    patch: ProblemPatch,
    state: State<'_, AppServices>,
) -> Result<Option<Problem>, String> {
    let mut problems = state.problems().map_err(|e| e.to_string())?;
    problems.update(&id, patch).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_problem(id: String, state: State<'_, AppServices>) -> Result<bool, String> {
    let mut problems = state.problems().map_err(|e| e.to_string())?;
    problems.delete(&id).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn search_problems(
    query: String,
    state: State<'_, AppServices>,
) -> Result<Vec<Problem>, String> {
    let problems = state.problems().map_err(|e| e.to_string())?;
    Ok(problems.search(&query).into_iter().cloned().collect())
}

#[tauri::command]
pub async fn get_problems_by_tag(
    tag: String,
    state: State<'_, AppServices>,
) -> Result<Vec<Problem>, String> {
    let problems = state.problems().map_err(|e| e.to_string())?;
    Ok(problems.by_tag(&tag).into_iter().cloned().collect())
}

/// 用系统浏览器打开题目链接
#[tauri::command]
#[allow(deprecated)]
pub async fn open_problem_link(
    id: String,
    app: AppHandle,
    state: State<'_, AppServices>,
) -> Result<(), String> {
    let link = {
        let problems = state.problems().map_err(|e| e.to_string())?;
        problems
            .get(&id)
            .and_then(|p| p.link.clone())
            .ok_or_else(|| format!("题目没有链接: {}", id))?
    };

    app.shell().open(link, None).map_err(|e| e.to_string())
}

// ==================== 笔记 ====================

#[tauri::command]
pub async fn list_notes(state: State<'_, AppServices>) -> Result<Vec<Note>, String> {
    let notes = state.notes().map_err(|e| e.to_string())?;
    Ok(notes.all().to_vec())
}

#[tauri::command]
pub async fn add_note(draft: NoteDraft, state: State<'_, AppServices>) -> Result<Note, String> {
    let mut notes = state.notes().map_err(|e| e.to_string())?;
    notes.add(draft).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn update_note(
    id: String,
    patch: NotePatch,
    state: State<'_, AppServices>,
) -> Result<Option<Note>, String> {
    let mut notes = state.notes().map_err(|e| e.to_string())?;
    notes.update(&id, patch).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_note(id: String, state: State<'_, AppServices>) -> Result<bool, String> {
    let mut notes = state.notes().map_err(|e| e.to_string())?;
    notes.delete(&id).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn search_notes(query: String, state: State<'_, AppServices>) -> Result<Vec<Note>, String> {
    let notes = state.notes().map_err(|e| e.to_string())?;
    Ok(notes.search(&query).into_iter().cloned().collect())
}

#[tauri::command]
pub async fn render_note(id: String, state: State<'_, AppServices>) -> Result<Option<String>, String> {
    let notes = state.notes().map_err(|e| e.to_string())?;
    Ok(notes.render_html(&id))
}

// ==================== 代码片段 ====================

#[tauri::command]
pub async fn list_snippets(state: State<'_, AppServices>) -> Result<Vec<Snippet>, String> {
    let snippets = state.snippets().map_err(|e| e.to_string())?;
    Ok(snippets.all().to_vec())
}

#[tauri::command]
pub async fn add_snippet(
    draft: SnippetDraft,
    state: State<'_, AppServices>,
) -> Result<Snippet, String> {
    let mut snippets = state.snippets().map_err(|e| e.to_string())?;
    snippets.add(draft).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn update_snippet(
    id: String,
    patch: SnippetPatch,
    state: State<'_, AppServices>,
) -> Result<Option<Snippet>, String> {
    let mut snippets = state.snippets().map_err(|e| e.to_string())?;
    snippets.update(&id, patch).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_snippet(id: String, state: State<'_, AppServices>) -> Result<bool, String> {
    let mut snippets = state.snippets().map_err(|e| e.to_string())?;
    snippets.delete(&id).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn search_snippets(
    query: String,
    language: Option<String>,
    state: State<'_, AppServices>,
) -> Result<Vec<Snippet>, String> {
    let snippets = state.snippets().map_err(|e| e.to_string())?;
    let mut found: Vec<Snippet> = snippets.search(&query).into_iter().cloned().collect();
    if let Some(language) = language {
        found.retain(|s| s.language.eq_ignore_ascii_case(&language));
    }
    Ok(found)
}
