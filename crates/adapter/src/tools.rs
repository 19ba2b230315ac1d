//! The Sonarr tool set.
//!
//! Each handler receives arguments that already passed schema validation, issues its upstream
//! call(s) through the shared [`SonarrClient`], and reshapes the response.

use crate::error::{ToolError, upstream_message};
use crate::registry::{Arguments, DATE_FORMAT, ParamSpec, ParamType, ToolDefinition};
use crate::shaping;
use chrono::{Days, Local, NaiveDate};
use serde_json::{Value, json};
use sonarr_mcp_upstream::{Method, SonarrClient, UpstreamError, UpstreamRequest};
use std::sync::Arc;
use tracing::{debug, info};

/// Days before/after today covered by `get_calendar` when no range is given.
pub const CALENDAR_DAYS_BACK: u64 = 7;
pub const CALENDAR_DAYS_AHEAD: u64 = 30;

/// Sonarr's validator code for "this series has already been added".
const SERIES_EXISTS_VALIDATOR: &str = "SeriesExistsValidator";

/// Operator-provided fallbacks for `add_series`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDefaults {
    pub root_folder: Option<String>,
    pub quality_profile_id: Option<i64>,
    pub language_profile_id: i64,
}

impl Default for SeriesDefaults {
    fn default() -> Self {
        Self {
            root_folder: None,
            quality_profile_id: None,
            language_profile_id: 1,
        }
    }
}

/// Everything a handler needs. Cheap to clone.
#[derive(Clone)]
pub struct ToolContext {
    pub client: SonarrClient,
    pub defaults: Arc<SeriesDefaults>,
}

impl ToolContext {
    #[must_use]
    pub fn new(client: SonarrClient, defaults: SeriesDefaults) -> Self {
        Self {
            client,
            defaults: Arc::new(defaults),
        }
    }
}

type HandlerResult = Result<Value, ToolError>;

/// All tools exposed by the adapter, in listing order.
#[must_use]
pub fn sonarr_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_series_list",
            title: "List series",
            description: "Retrieve all TV series in the Sonarr library, optionally filtered by \
                          monitored status. Returns a compact summary per series.",
            method: Method::GET,
            params: vec![ParamSpec::optional(
                "monitored",
                ParamType::Boolean,
                "Only return series whose monitored flag equals this value",
            )],
            handler: |ctx, args| Box::pin(get_series_list(ctx, args)),
        },
        ToolDefinition {
            name: "get_series_details",
            title: "Series details",
            description: "Get detailed information about one series, including per-season \
                          statistics.",
            method: Method::GET,
            params: vec![
                ParamSpec::required("series_id", ParamType::Integer, "Sonarr series id")
                    .with_minimum(1),
            ],
            handler: |ctx, args| Box::pin(get_series_details(ctx, args)),
        },
        ToolDefinition {
            name: "search_series",
            title: "Search for new series",
            description: "Search external metadata (TVDB) for series that can be added to \
                          Sonarr. Accepts a name or an id such as `tvdb:81189`.",
            method: Method::GET,
            params: vec![ParamSpec::required(
                "term",
                ParamType::String,
                "Series name or external id",
            )],
            handler: |ctx, args| Box::pin(search_series(ctx, args)),
        },
        ToolDefinition {
            name: "add_series",
            title: "Add series",
            description: "Add a series to Sonarr by TVDB id and start searching for missing \
                          episodes. Root folder and quality profile default to the configured \
                          values, then to the first ones Sonarr reports.",
            method: Method::POST,
            params: vec![
                ParamSpec::required("tvdb_id", ParamType::Integer, "TVDB id of the series")
                    .with_minimum(1),
                ParamSpec::required("title", ParamType::String, "Series title"),
                ParamSpec::optional(
                    "root_folder_path",
                    ParamType::String,
                    "Root folder to store the series under",
                ),
                ParamSpec::optional(
                    "quality_profile_id",
                    ParamType::Integer,
                    "Quality profile id",
                )
                .with_minimum(1),
                ParamSpec::optional(
                    "monitored",
                    ParamType::Boolean,
                    "Whether the new series is monitored",
                )
                .with_default(json!(true)),
            ],
            handler: |ctx, args| Box::pin(add_series(ctx, args)),
        },
        ToolDefinition {
            name: "get_calendar",
            title: "Episode calendar",
            description: "Episodes airing in a date range (YYYY-MM-DD). Defaults to 7 days back \
                          and 30 days forward.",
            method: Method::GET,
            params: vec![
                ParamSpec::optional("start", ParamType::Date, "First day of the range"),
                ParamSpec::optional("end", ParamType::Date, "Last day of the range"),
                ParamSpec::optional(
                    "unmonitored",
                    ParamType::Boolean,
                    "Include unmonitored episodes",
                )
                .with_default(json!(false)),
            ],
            handler: |ctx, args| Box::pin(get_calendar(ctx, args)),
        },
        ToolDefinition {
            name: "get_queue",
            title: "Download queue",
            description: "Current download queue with per-item progress.",
            method: Method::GET,
            params: vec![
                ParamSpec::optional(
                    "include_unknown_series_items",
                    ParamType::Boolean,
                    "Include queue items Sonarr cannot match to a series",
                )
                .with_default(json!(false)),
            ],
            handler: |ctx, args| Box::pin(get_queue(ctx, args)),
        },
        ToolDefinition {
            name: "get_history",
            title: "Activity history",
            description: "Download and activity history, newest first.",
            method: Method::GET,
            params: vec![
                ParamSpec::optional("page", ParamType::Integer, "Page number (1-based)")
                    .with_default(json!(1))
                    .with_minimum(1),
                ParamSpec::optional("page_size", ParamType::Integer, "Records per page")
                    .with_default(json!(20))
                    .with_minimum(1)
                    .with_maximum(250),
                ParamSpec::optional(
                    "series_id",
                    ParamType::Integer,
                    "Only history for this series",
                )
                .with_minimum(1),
            ],
            handler: |ctx, args| Box::pin(get_history(ctx, args)),
        },
        ToolDefinition {
            name: "trigger_series_search",
            title: "Search for missing episodes",
            description: "Queue a Sonarr search for all missing monitored episodes of a series. \
                          Returns as soon as the command is queued.",
            method: Method::POST,
            params: vec![
                ParamSpec::required("series_id", ParamType::Integer, "Sonarr series id")
                    .with_minimum(1),
            ],
            handler: |ctx, args| Box::pin(trigger_series_search(ctx, args)),
        },
        ToolDefinition {
            name: "get_system_status",
            title: "System status",
            description: "Sonarr version information and health check results.",
            method: Method::GET,
            params: Vec::new(),
            handler: |ctx, args| Box::pin(get_system_status(ctx, args)),
        },
    ]
}

async fn get_series_list(ctx: ToolContext, args: Arguments) -> HandlerResult {
    let all = ctx.client.call_json(&UpstreamRequest::get("series")).await?;
    Ok(shaping::series_list(&all, args.bool("monitored")))
}

async fn get_series_details(ctx: ToolContext, args: Arguments) -> HandlerResult {
    let id = args.require_i64("series_id")?;
    let series = ctx
        .client
        .call_json(&UpstreamRequest::get(format!("series/{id}")))
        .await?;
    Ok(shaping::series_details(&series))
}

async fn search_series(ctx: ToolContext, args: Arguments) -> HandlerResult {
    let term = args.require_str("term")?;
    let results = ctx
        .client
        .call_json(&UpstreamRequest::get("series/lookup").query("term", term))
        .await?;
    Ok(shaping::search_results(term, &results))
}

async fn add_series(ctx: ToolContext, args: Arguments) -> HandlerResult {
    let tvdb_id = args.require_i64("tvdb_id")?;
    let title = args.require_str("title")?;
    let monitored = args.bool("monitored").unwrap_or(true);

    let root_folder_path = match args
        .str("root_folder_path")
        .map(str::to_string)
        .or_else(|| ctx.defaults.root_folder.clone())
    {
        Some(path) => path,
        None => first_root_folder(&ctx.client).await?,
    };
    let quality_profile_id = match args
        .i64("quality_profile_id")
        .or(ctx.defaults.quality_profile_id)
    {
        Some(id) => id,
        None => first_quality_profile(&ctx.client).await?,
    };

    let candidates = ctx
        .client
        .call_json(&UpstreamRequest::get("series/lookup").query("term", format!("tvdb:{tvdb_id}")))
        .await?;
    let candidate = candidates.as_array().and_then(|found| {
        found
            .iter()
            .find(|c| c.get("tvdbId").and_then(Value::as_i64) == Some(tvdb_id))
            .or_else(|| found.first())
    });
    if candidate.is_none() {
        debug!(tvdb_id, "lookup returned no match, adding with supplied title");
    }

    let field = |key: &str| candidate.and_then(|c| c.get(key)).cloned();
    let mut body = json!({
        "title": field("title").filter(Value::is_string).unwrap_or_else(|| json!(title)),
        "tvdbId": tvdb_id,
        "qualityProfileId": quality_profile_id,
        "languageProfileId": ctx.defaults.language_profile_id,
        "rootFolderPath": root_folder_path,
        "monitored": monitored,
        "seasonFolder": true,
        "addOptions": {
            "monitor": "all",
            "searchForMissingEpisodes": true,
        },
        "images": field("images").filter(Value::is_array).unwrap_or_else(|| json!([])),
        "seasons": field("seasons").filter(Value::is_array).unwrap_or_else(|| json!([])),
    });
    if let Some(slug) = field("titleSlug").filter(Value::is_string) {
        body["titleSlug"] = slug;
    }

    let created = match ctx
        .client
        .call_json(&UpstreamRequest::post("series").json(body))
        .await
    {
        Ok(created) => created,
        Err(UpstreamError::Status { status: 400, body }) if is_series_exists(&body) => {
            return Err(ToolError::Conflict(upstream_message(&body).unwrap_or_else(
                || format!("series with TVDB id {tvdb_id} is already in Sonarr"),
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let series_id = created.get("id").and_then(Value::as_i64);
    info!(tvdb_id, series_id, "series added");
    Ok(shaping::added_series(&created))
}

fn is_series_exists(body: &Value) -> bool {
    body.as_array().is_some_and(|failures| {
        failures.iter().any(|f| {
            f.get("errorCode").and_then(Value::as_str) == Some(SERIES_EXISTS_VALIDATOR)
                || f.get("errorMessage")
                    .and_then(Value::as_str)
                    .is_some_and(|m| m.contains("already been added"))
        })
    })
}

async fn first_root_folder(client: &SonarrClient) -> Result<String, ToolError> {
    let folders = client.call_json(&UpstreamRequest::get("rootfolder")).await?;
    folders
        .pointer("/0/path")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::NotFound("no root folders configured in Sonarr".into()))
}

async fn first_quality_profile(client: &SonarrClient) -> Result<i64, ToolError> {
    let profiles = client
        .call_json(&UpstreamRequest::get("qualityprofile"))
        .await?;
    profiles
        .pointer("/0/id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ToolError::NotFound("no quality profiles configured in Sonarr".into()))
}

/// Resolve the calendar range.
///
/// With no bounds the window runs from `today - 7d` to `today + 30d`. A single bound keeps the
/// same window length anchored on that bound.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] if both bounds are given and the end precedes the
/// start.
pub fn calendar_range(
    args: &Arguments,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), ToolError> {
    let window = Days::new(CALENDAR_DAYS_BACK + CALENDAR_DAYS_AHEAD);
    match (args.date("start"), args.date("end")) {
        (Some(start), Some(end)) if end < start => Err(ToolError::InvalidArguments(format!(
            "end ({}) precedes start ({})",
            end.format(DATE_FORMAT),
            start.format(DATE_FORMAT)
        ))),
        (Some(start), Some(end)) => Ok((start, end)),
        (Some(start), None) => Ok((start, start.checked_add_days(window).unwrap_or(start))),
        (None, Some(end)) => Ok((end.checked_sub_days(window).unwrap_or(end), end)),
        (None, None) => Ok((
            today
                .checked_sub_days(Days::new(CALENDAR_DAYS_BACK))
                .unwrap_or(today),
            today
                .checked_add_days(Days::new(CALENDAR_DAYS_AHEAD))
                .unwrap_or(today),
        )),
    }
}

async fn get_calendar(ctx: ToolContext, args: Arguments) -> HandlerResult {
    let (start, end) = calendar_range(&args, Local::now().date_naive())?;
    let start = start.format(DATE_FORMAT).to_string();
    let end = end.format(DATE_FORMAT).to_string();

    let mut request = UpstreamRequest::get("calendar")
        .query("start", &start)
        .query("end", &end)
        .query("includeSeries", true);
    if args.bool("unmonitored") == Some(true) {
        request = request.query("unmonitored", true);
    }
    let episodes = ctx.client.call_json(&request).await?;
    Ok(shaping::calendar(&start, &end, &episodes))
}

async fn get_queue(ctx: ToolContext, args: Arguments) -> HandlerResult {
    let mut request = UpstreamRequest::get("queue")
        .query("includeSeries", true)
        .query("includeEpisode", true);
    if args.bool("include_unknown_series_items") == Some(true) {
        request = request.query("includeUnknownSeriesItems", true);
    }
    let page = ctx.client.call_json(&request).await?;
    Ok(shaping::queue(&page))
}

async fn get_history(ctx: ToolContext, args: Arguments) -> HandlerResult {
    let page = args.i64("page").unwrap_or(1);
    let page_size = args.i64("page_size").unwrap_or(20);
    let request = UpstreamRequest::get("history")
        .query("page", page)
        .query("pageSize", page_size)
        .query("sortKey", "date")
        .query("sortDirection", "descending")
        .query("includeSeries", true)
        .query("includeEpisode", true)
        .query_opt("seriesId", args.i64("series_id"));
    let data = ctx.client.call_json(&request).await?;
    Ok(shaping::history(page, page_size, &data))
}

async fn trigger_series_search(ctx: ToolContext, args: Arguments) -> HandlerResult {
    let series_id = args.require_i64("series_id")?;
    let command = ctx
        .client
        .call_json(&UpstreamRequest::post("command").json(json!({
            "name": "SeriesSearch",
            "seriesId": series_id,
        })))
        .await?;
    let command_id = command.get("id").and_then(Value::as_i64);
    info!(series_id, command_id, "series search queued");
    Ok(shaping::command_ack(series_id, &command))
}

async fn get_system_status(ctx: ToolContext, _args: Arguments) -> HandlerResult {
    let status_request = UpstreamRequest::get("system/status");
    let health_request = UpstreamRequest::get("health");
    let (status, health) = tokio::try_join!(
        ctx.client.call_json(&status_request),
        ctx.client.call_json(&health_request),
    )?;
    Ok(shaping::system_status(&status, &health))
}
