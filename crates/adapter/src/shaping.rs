//! Reshape raw Sonarr payloads into compact, model-friendly summaries.
//!
//! Sonarr responses are large and deeply nested. Each function here picks the fields a client
//! actually needs and flattens them into snake_case objects. Missing upstream fields become
//! `null` (or zero for counters) rather than errors.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Overview lengths (in characters) for the different views.
pub const DETAILS_OVERVIEW_CHARS: usize = 500;
pub const SEARCH_OVERVIEW_CHARS: usize = 300;
pub const CALENDAR_OVERVIEW_CHARS: usize = 200;

pub const MAX_GENRES: usize = 3;
pub const MAX_SEARCH_RESULTS: usize = 10;

fn at(v: &Value, pointer: &str) -> Value {
    v.pointer(pointer).cloned().unwrap_or(Value::Null)
}

fn count_at(v: &Value, pointer: &str) -> i64 {
    v.pointer(pointer).and_then(Value::as_i64).unwrap_or(0)
}

fn number_at(v: &Value, pointer: &str) -> f64 {
    v.pointer(pointer).and_then(Value::as_f64).unwrap_or(0.0)
}

fn items(v: &Value) -> &[Value] {
    v.as_array().map(Vec::as_slice).unwrap_or_default()
}

fn number_or_zero(v: &Value, pointer: &str) -> Value {
    v.pointer(pointer)
        .filter(|x| x.is_number())
        .cloned()
        .unwrap_or_else(|| json!(0))
}

fn len_at(v: &Value, pointer: &str) -> usize {
    v.pointer(pointer).map_or(0, |x| items(x).len())
}

fn first_n(v: &Value, pointer: &str, n: usize) -> Value {
    Value::Array(
        v.pointer(pointer)
            .map(items)
            .unwrap_or_default()
            .iter()
            .take(n)
            .cloned()
            .collect(),
    )
}

/// Cut `text` to at most `max_chars` characters, appending `...` when something was dropped.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn overview(v: &Value, max_chars: usize) -> Value {
    let text = v.get("overview").and_then(Value::as_str).unwrap_or_default();
    Value::String(truncate_with_ellipsis(text, max_chars))
}

fn series_summary(series: &Value) -> Value {
    let total = count_at(series, "/statistics/episodeCount");
    let available = count_at(series, "/statistics/episodeFileCount");
    json!({
        "id": at(series, "/id"),
        "title": at(series, "/title"),
        "status": at(series, "/status"),
        "monitored": at(series, "/monitored"),
        "year": at(series, "/year"),
        "seasons": len_at(series, "/seasons"),
        "episodes": {
            "total": total,
            "available": available,
            "missing": (total - available).max(0),
        },
        "quality_profile": at(series, "/qualityProfileId"),
        "path": at(series, "/path"),
        "network": at(series, "/network"),
        "genres": first_n(series, "/genres", MAX_GENRES),
    })
}

/// Library overview, optionally filtered by monitored flag.
#[must_use]
pub fn series_list(all: &Value, monitored: Option<bool>) -> Value {
    let series: Vec<Value> = items(all)
        .iter()
        .filter(|s| {
            monitored.is_none_or(|m| s.get("monitored").and_then(Value::as_bool) == Some(m))
        })
        .map(series_summary)
        .collect();
    let monitored_count = series
        .iter()
        .filter(|s| s["monitored"].as_bool() == Some(true))
        .count();
    json!({
        "total_series": series.len(),
        "monitored_count": monitored_count,
        "series": series,
    })
}

#[must_use]
pub fn series_details(series: &Value) -> Value {
    let seasons: Vec<Value> = items(&at(series, "/seasons"))
        .iter()
        .map(|season| {
            json!({
                "season_number": at(season, "/seasonNumber"),
                "monitored": at(season, "/monitored"),
                "statistics": object_or_empty(at(season, "/statistics")),
            })
        })
        .collect();

    json!({
        "basic_info": {
            "id": at(series, "/id"),
            "title": at(series, "/title"),
            "sort_title": at(series, "/sortTitle"),
            "status": at(series, "/status"),
            "overview": overview(series, DETAILS_OVERVIEW_CHARS),
            "network": at(series, "/network"),
            "air_time": at(series, "/airTime"),
            "runtime": at(series, "/runtime"),
            "year": at(series, "/year"),
            "genres": array_or_empty(at(series, "/genres")),
            "certification": at(series, "/certification"),
            "imdb_id": at(series, "/imdbId"),
            "tvdb_id": at(series, "/tvdbId"),
        },
        "monitoring": {
            "monitored": at(series, "/monitored"),
            "season_folder": at(series, "/seasonFolder"),
            "quality_profile_id": at(series, "/qualityProfileId"),
            "language_profile_id": at(series, "/languageProfileId"),
        },
        "statistics": object_or_empty(at(series, "/statistics")),
        "file_info": {
            "path": at(series, "/path"),
            "size_on_disk": count_at(series, "/statistics/sizeOnDisk"),
        },
        "seasons": seasons,
    })
}

fn object_or_empty(v: Value) -> Value {
    if v.is_object() { v } else { Value::Object(Map::new()) }
}

fn array_or_empty(v: Value) -> Value {
    if v.is_array() { v } else { Value::Array(Vec::new()) }
}

#[must_use]
pub fn search_results(term: &str, results: &Value) -> Value {
    let results: Vec<Value> = items(results)
        .iter()
        .take(MAX_SEARCH_RESULTS)
        .map(|r| {
            json!({
                "title": at(r, "/title"),
                "year": at(r, "/year"),
                "tvdb_id": at(r, "/tvdbId"),
                "imdb_id": at(r, "/imdbId"),
                "overview": overview(r, SEARCH_OVERVIEW_CHARS),
                "network": at(r, "/network"),
                "status": at(r, "/status"),
                "genres": first_n(r, "/genres", MAX_GENRES),
                "runtime": at(r, "/runtime"),
                "seasons": len_at(r, "/seasons"),
                "images": array_or_empty(at(r, "/images")),
            })
        })
        .collect();
    json!({
        "search_term": term,
        "results_count": results.len(),
        "results": results,
    })
}

#[must_use]
pub fn added_series(created: &Value) -> Value {
    let title = created
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("series");
    json!({
        "added_series": {
            "id": at(created, "/id"),
            "title": at(created, "/title"),
            "tvdb_id": at(created, "/tvdbId"),
            "path": at(created, "/path"),
            "monitored": at(created, "/monitored"),
            "quality_profile_id": at(created, "/qualityProfileId"),
            "seasons": len_at(created, "/seasons"),
        },
        "message": format!("Successfully added '{title}' to Sonarr"),
    })
}

/// Calendar entries, flat and grouped by air date (ascending).
#[must_use]
pub fn calendar(start: &str, end: &str, episodes: &Value) -> Value {
    let episodes: Vec<Value> = items(episodes)
        .iter()
        .map(|ep| {
            json!({
                "episode_id": at(ep, "/id"),
                "series_title": at(ep, "/series/title"),
                "series_id": at(ep, "/seriesId"),
                "season_number": at(ep, "/seasonNumber"),
                "episode_number": at(ep, "/episodeNumber"),
                "title": at(ep, "/title"),
                "air_date": at(ep, "/airDate"),
                "air_date_utc": at(ep, "/airDateUtc"),
                "has_file": at(ep, "/hasFile"),
                "monitored": at(ep, "/monitored"),
                "overview": overview(ep, CALENDAR_OVERVIEW_CHARS),
            })
        })
        .collect();

    let mut by_date: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for ep in &episodes {
        let key = match &ep["air_date"] {
            Value::String(s) => s.clone(),
            Value::Null => "unknown".to_string(),
            other => other.to_string(),
        };
        by_date.entry(key).or_default().push(ep.clone());
    }

    let with_files = episodes
        .iter()
        .filter(|ep| ep["has_file"].as_bool() == Some(true))
        .count();

    json!({
        "date_range": format!("{start} to {end}"),
        "total_episodes": episodes.len(),
        "episodes_with_files": with_files,
        "episodes_by_date": by_date,
        "all_episodes": episodes,
    })
}

/// Download progress in percent, rounded to two decimals.
#[must_use]
pub fn progress_percent(size: f64, sizeleft: f64) -> f64 {
    let ratio = 1.0 - sizeleft / size.max(1.0);
    (ratio * 100.0 * 100.0).round() / 100.0
}

#[must_use]
pub fn queue(page: &Value) -> Value {
    let queue: Vec<Value> = items(&at(page, "/records"))
        .iter()
        .map(|item| {
            let size = number_at(item, "/size");
            let sizeleft = number_at(item, "/sizeleft");
            json!({
                "id": at(item, "/id"),
                "series_title": at(item, "/series/title"),
                "episode_title": at(item, "/episode/title"),
                "season_number": at(item, "/episode/seasonNumber"),
                "episode_number": at(item, "/episode/episodeNumber"),
                "quality": at(item, "/quality/quality/name"),
                "size": number_or_zero(item, "/size"),
                "sizeleft": number_or_zero(item, "/sizeleft"),
                "status": at(item, "/status"),
                "tracked_download_status": at(item, "/trackedDownloadStatus"),
                "download_client": at(item, "/downloadClient"),
                "output_path": at(item, "/outputPath"),
                "progress": progress_percent(size, sizeleft),
            })
        })
        .collect();

    let status_is = |item: &Value, wanted: &[&str]| {
        item["status"]
            .as_str()
            .is_some_and(|s| wanted.iter().any(|w| s.eq_ignore_ascii_case(w)))
    };
    let active = queue
        .iter()
        .filter(|i| status_is(i, &["downloading", "queued"]))
        .count();
    let completed = queue.iter().filter(|i| status_is(i, &["completed"])).count();

    json!({
        "total_items": queue.len(),
        "active_downloads": active,
        "completed_items": completed,
        "queue": queue,
    })
}

#[must_use]
pub fn history(page: i64, page_size: i64, data: &Value) -> Value {
    let history: Vec<Value> = items(&at(data, "/records"))
        .iter()
        .map(|item| {
            json!({
                "id": at(item, "/id"),
                "episode_id": at(item, "/episodeId"),
                "series_title": at(item, "/series/title"),
                "episode_title": at(item, "/episode/title"),
                "season_number": at(item, "/episode/seasonNumber"),
                "episode_number": at(item, "/episode/episodeNumber"),
                "quality": at(item, "/quality/quality/name"),
                "event_type": at(item, "/eventType"),
                "date": at(item, "/date"),
                "download_client": at(item, "/data/downloadClient"),
                "source_title": at(item, "/sourceTitle"),
            })
        })
        .collect();
    json!({
        "page": page,
        "page_size": page_size,
        "total_records": count_at(data, "/totalRecords"),
        "records_on_page": history.len(),
        "history": history,
    })
}

#[must_use]
pub fn command_ack(series_id: i64, command: &Value) -> Value {
    json!({
        "command_id": at(command, "/id"),
        "command_name": at(command, "/name"),
        "series_id": series_id,
        "status": at(command, "/status"),
        "queued_at": at(command, "/queued"),
        "message": format!("Search command queued for series ID {series_id}"),
    })
}

#[must_use]
pub fn system_status(status: &Value, health: &Value) -> Value {
    let issues: Vec<Value> = items(health)
        .iter()
        .map(|issue| {
            json!({
                "type": at(issue, "/type"),
                "message": at(issue, "/message"),
                "wiki_url": at(issue, "/wikiUrl"),
            })
        })
        .collect();
    let overall = if issues.is_empty() { "healthy" } else { "has_issues" };
    json!({
        "system": {
            "version": at(status, "/version"),
            "build_time": at(status, "/buildTime"),
            "startup_path": at(status, "/startupPath"),
            "app_data": at(status, "/appData"),
            "os_name": at(status, "/osName"),
            "os_version": at(status, "/osVersion"),
            "is_debug": at(status, "/isDebug"),
            "is_production": at(status, "/isProduction"),
            "is_admin": at(status, "/isAdmin"),
            "is_user_interactive": at(status, "/isUserInteractive"),
            "branch": at(status, "/branch"),
            "authentication": at(status, "/authentication"),
            "migration_version": at(status, "/migrationVersion"),
            "url_base": at(status, "/urlBase"),
            "runtime_version": at(status, "/runtimeVersion"),
        },
        "health": {
            "total_issues": issues.len(),
            "issues": issues,
            "status": overall,
        },
    })
}

/// Episode record served by the `sonarr://episode/{id}` resource.
#[must_use]
pub fn episode_record(ep: &Value) -> Value {
    let mut record = json!({
        "episode_info": {
            "id": at(ep, "/id"),
            "title": at(ep, "/title"),
            "season_number": at(ep, "/seasonNumber"),
            "episode_number": at(ep, "/episodeNumber"),
            "air_date": at(ep, "/airDate"),
            "overview": at(ep, "/overview"),
            "has_file": at(ep, "/hasFile"),
            "monitored": at(ep, "/monitored"),
        },
        "series_info": {
            "series_id": at(ep, "/seriesId"),
            "series_title": at(ep, "/series/title"),
        },
    });
    if let Some(file) = ep.get("episodeFile").filter(|f| f.is_object()) {
        record["file_info"] = json!({
            "file_id": at(file, "/id"),
            "relative_path": at(file, "/relativePath"),
            "path": at(file, "/path"),
            "size": at(file, "/size"),
            "quality": at(file, "/quality/quality/name"),
            "media_info": object_or_empty(at(file, "/mediaInfo")),
        });
    }
    record
}
