//! Implements the `Ledger` trait against a Google spreadsheet through the `sheets` client.

use crate::api::{Credentials, Ledger, Worksheet};
use crate::error::{ErrorType, IntoResult};
use crate::model::CellRef;
use crate::Result;
use anyhow::Context;
use sheets::types::{
    BatchUpdateSpreadsheetRequest, BatchUpdateSpreadsheetResponse, BatchUpdateValuesRequest,
    DateTimeRenderOption, DeleteDimensionRequest, DeleteSheetRequest, Dimension, DimensionRange,
    DuplicateSheetRequest, InsertDimensionRequest, Request, SheetProperties, ValueInputOption,
    ValueRange, ValueRenderOption,
};
use sheets::ClientError;
use tracing::trace;

/// Implements the `Ledger` trait using a Google spreadsheet. It takes `Credentials`, from which it
/// gets a current access token before each call.
pub(super) struct GoogleLedger {
    spreadsheet_id: String,
    credentials: Credentials,
    /// Replaces `https://sheets.googleapis.com` when set.
    host: Option<String>,
}

impl GoogleLedger {
    pub(super) fn new(spreadsheet_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
            host: None,
        }
    }

    #[cfg(test)]
    fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Creates a sheets client with a current access token.
    async fn client(&mut self) -> Result<sheets::Client> {
        let access_token = self.credentials.access_token().await?;

        // The sheets crate wants client_id, client_secret, redirect_uri and refresh_token, but
        // API calls only need the access token. Refreshing is handled by the Credentials.
        let mut client = sheets::Client::new(
            String::new(),
            String::new(),
            String::new(),
            access_token,
            String::new(),
        );
        if let Some(host) = &self.host {
            client.with_host_override(host);
        }
        Ok(client)
    }

    async fn values(
        &mut self,
        worksheet: &str,
        render: ValueRenderOption,
    ) -> Result<Vec<Vec<String>>> {
        let range = a1(worksheet, "A:ZZ");
        let spreadsheet_id = self.spreadsheet_id.clone();
        let response = self
            .client()
            .await?
            .spreadsheets()
            .values_get(
                &spreadsheet_id,
                &range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                render,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch the {worksheet} worksheet"))
            .pub_result(ErrorType::RemoteService)?;
        Ok(response.body.values)
    }

    async fn write_values(
        &mut self,
        worksheet: &str,
        start: CellRef,
        rows: Vec<Vec<String>>,
        input: ValueInputOption,
    ) -> Result<()> {
        let request = BatchUpdateValuesRequest {
            data: vec![ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: a1(worksheet, &start.to_string()),
                values: rows,
            }],
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(input),
        };

        let spreadsheet_id = self.spreadsheet_id.clone();
        self.client()
            .await?
            .spreadsheets()
            .values_batch_update(&spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write to {worksheet} at {start}"))
            .pub_result(ErrorType::RemoteService)?;
        Ok(())
    }

    /// Sends `request` to the spreadsheet `batchUpdate` endpoint.
    async fn batch_update(&mut self, request: Request) -> Result<BatchUpdateSpreadsheetResponse> {
        let body = BatchUpdateSpreadsheetRequest {
            include_spreadsheet_in_response: None,
            requests: vec![request],
            response_include_grid_data: None,
            response_ranges: Vec::new(),
        };
        let spreadsheet_id = self.spreadsheet_id.clone();
        let response = self
            .client()
            .await?
            .spreadsheets()
            .batch_update(&spreadsheet_id, &body)
            .await
            .map_err(map_client_error)
            .context("Failed to update the spreadsheet")
            .pub_result(ErrorType::RemoteService)?;
        Ok(response.body)
    }
}

#[async_trait::async_trait]
impl Ledger for GoogleLedger {
    async fn worksheets(&mut self) -> Result<Vec<Worksheet>> {
        trace!("worksheets for {}", self.spreadsheet_id);
        let spreadsheet_id = self.spreadsheet_id.clone();
        let response = self
            .client()
            .await?
            .spreadsheets()
            .get(&spreadsheet_id, false, &[])
            .await
            .map_err(map_client_error)
            .context("Failed to list worksheets")
            .pub_result(ErrorType::RemoteService)?;

        let mut worksheets: Vec<Worksheet> = response
            .body
            .sheets
            .into_iter()
            .filter_map(|sheet| sheet.properties)
            .map(worksheet)
            .collect();
        worksheets.sort_by_key(|w| w.index);
        Ok(worksheets)
    }

    async fn get(&mut self, worksheet: &str) -> Result<Vec<Vec<String>>> {
        trace!("get for {worksheet}");
        self.values(worksheet, ValueRenderOption::FormattedValue)
            .await
    }

    async fn get_formulas(&mut self, worksheet: &str) -> Result<Vec<Vec<String>>> {
        trace!("get_formulas for {worksheet}");
        self.values(worksheet, ValueRenderOption::Formula).await
    }

    async fn write_range(
        &mut self,
        worksheet: &str,
        start: CellRef,
        rows: Vec<Vec<String>>,
    ) -> Result<()> {
        trace!("write_range for {worksheet} at {start}");
        self.write_values(worksheet, start, rows, ValueInputOption::UserEntered)
            .await
    }

    async fn insert_row(
        &mut self,
        worksheet: &Worksheet,
        index: usize,
        values: Vec<String>,
    ) -> Result<()> {
        trace!("insert_row {index} in {}", worksheet.title);
        let mut request = empty_request()?;
        request.insert_dimension = Some(InsertDimensionRequest {
            inherit_from_before: Some(false),
            range: Some(row_range(worksheet, index)),
        });
        self.batch_update(request).await?;
        self.write_values(
            &worksheet.title,
            CellRef::new(index, 1),
            vec![values],
            ValueInputOption::Raw,
        )
        .await
    }

    async fn delete_row(&mut self, worksheet: &Worksheet, index: usize) -> Result<()> {
        trace!("delete_row {index} in {}", worksheet.title);
        let mut request = empty_request()?;
        request.delete_dimension = Some(DeleteDimensionRequest {
            range: Some(row_range(worksheet, index)),
        });
        self.batch_update(request).await?;
        Ok(())
    }

    async fn duplicate_worksheet(&mut self, source: &Worksheet, title: &str) -> Result<Worksheet> {
        trace!("duplicate_worksheet {} as {title}", source.title);
        let mut request = empty_request()?;
        request.duplicate_sheet = Some(DuplicateSheetRequest {
            insert_sheet_index: 0,
            new_sheet_id: 0,
            new_sheet_name: title.to_string(),
            source_sheet_id: source.id,
        });
        let response = self.batch_update(request).await?;
        response
            .replies
            .into_iter()
            .next()
            .and_then(|reply| reply.duplicate_sheet)
            .and_then(|duplicate| duplicate.properties)
            .map(worksheet)
            .context("The Sheets API response is missing the duplicated sheet")
            .pub_result(ErrorType::RemoteService)
    }

    async fn delete_worksheet(&mut self, worksheet: &Worksheet) -> Result<()> {
        trace!("delete_worksheet {}", worksheet.title);
        let mut request = empty_request()?;
        request.delete_sheet = Some(DeleteSheetRequest {
            sheet_id: worksheet.id,
        });
        self.batch_update(request).await?;
        Ok(())
    }
}

/// A `Request` with every kind of update unset. Exactly one of them is set before sending.
fn empty_request() -> Result<Request> {
    serde_json::from_value(serde_json::Value::Object(Default::default()))
        .context("Unable to build a Sheets request")
}

/// The API leaves out `sheetId` and `index` when they are zero.
fn worksheet(properties: SheetProperties) -> Worksheet {
    Worksheet {
        id: properties.sheet_id,
        title: properties.title,
        index: usize::try_from(properties.index).unwrap_or_default(),
    }
}

/// A single row as a 0-based, end-exclusive `DimensionRange`.
fn row_range(worksheet: &Worksheet, index: usize) -> DimensionRange {
    DimensionRange {
        dimension: Some(Dimension::Rows),
        end_index: index as i64,
        sheet_id: worksheet.id,
        start_index: index.saturating_sub(1) as i64,
    }
}

/// Qualifies `range` with the worksheet title, quoting the title.
fn a1(worksheet: &str, range: &str) -> String {
    format!("'{}'!{range}", worksheet.replace('\'', "''"))
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}
