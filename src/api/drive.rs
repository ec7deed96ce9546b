//! Finds a spreadsheet by its title through the Google Drive API, for configs that name the
//! ledger by title instead of by URL or ID.

use crate::error::{not_found, ErrorType, IntoResult};
use crate::Result;
use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::{debug, warn};

pub const DRIVE_API: &str = "https://www.googleapis.com";

const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<File>,
}

#[derive(Debug, Deserialize)]
struct File {
    id: String,
}

/// The ID of the spreadsheet titled `title`. When several spreadsheets share the title, the most
/// recently modified one is used. The token needs a Drive scope, for example
/// `https://www.googleapis.com/auth/drive.metadata.readonly`.
pub async fn find_spreadsheet(api_url: &str, token: &str, title: &str) -> Result<String> {
    let query = format!(
        "name = '{}' and mimeType = '{SPREADSHEET_MIME_TYPE}' and trashed = false",
        title.replace('\\', "\\\\").replace('\'', "\\'")
    );
    let response = reqwest::Client::new()
        .get(format!("{}/drive/v3/files", api_url.trim_end_matches('/')))
        .bearer_auth(token)
        .query(&[
            ("q", query.as_str()),
            ("fields", "files(id)"),
            ("orderBy", "modifiedTime desc"),
        ])
        .send()
        .await
        .context("Failed to search Google Drive for the spreadsheet")
        .pub_result(ErrorType::RemoteService)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!(
            "Google Drive returned {status} while looking up '{title}', check that gsheets.scope \
            includes a Drive scope: {body}"
        ))
        .pub_result(ErrorType::RemoteService);
    }
    let list: FileList = response
        .json()
        .await
        .context("Unexpected Google Drive response")
        .pub_result(ErrorType::RemoteService)?;

    if list.files.len() > 1 {
        warn!("{} spreadsheets are titled '{title}', using the newest", list.files.len());
    }
    let file = list
        .files
        .into_iter()
        .next()
        .ok_or_else(|| not_found(format!("There is no spreadsheet titled '{title}'")))?;
    debug!("Spreadsheet '{title}' has ID {}", file.id);
    Ok(file.id)
}
