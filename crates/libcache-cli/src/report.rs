//! Status report rendering.

use libcache::{EntrySnapshot, LoadStatus};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryReport {
    pub nickname: String,
    pub scope: String,
    pub type_tag: String,
    pub uri: String,
    pub status: LoadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&EntrySnapshot> for LibraryReport {
    fn from(snapshot: &EntrySnapshot) -> Self {
        Self {
            nickname: snapshot.nickname.clone(),
            scope: snapshot.row.scope.to_string(),
            type_tag: snapshot.row.type_tag.clone(),
            uri: snapshot.row.uri.clone(),
            status: snapshot.status,
            error: snapshot.error.as_ref().map(|e| e.to_string()),
        }
    }
}

pub fn render_text(reports: &[LibraryReport]) -> String {
    let width = reports
        .iter()
        .map(|r| r.nickname.len())
        .max()
        .unwrap_or(0)
        .max("NICKNAME".len());

    let mut out = format!("{:<width$}  {:<7}  {:<10}  URI\n", "NICKNAME", "SCOPE", "STATUS");
    for report in reports {
        out.push_str(&format!(
            "{:<width$}  {:<7}  {:<10}  {}\n",
            report.nickname,
            report.scope,
            report.status.as_str(),
            report.uri
        ));
        if let Some(error) = &report.error {
            out.push_str(&format!("{:<width$}  -> {}\n", "", error));
        }
    }
    out
}

pub fn render_json(reports: &[LibraryReport]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}
