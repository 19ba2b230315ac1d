//! In-process fake of the Sonarr v3 API.
//!
//! Serves a small fixed catalog on `127.0.0.1:0`, records every request it receives (including
//! the `X-Api-Key` header), and keeps just enough state for series creation to collide on a
//! second attempt. Used by unit tests in the adapter and by binary-level integration tests.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse as _, Response};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Fixed poster bytes served for series that have a poster image.
pub const POSTER_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub api_key: Option<String>,
    pub body: Option<Value>,
}

struct FakeState {
    api_key: String,
    requests: Mutex<Vec<RecordedRequest>>,
    series: Mutex<Vec<Value>>,
    next_series_id: Mutex<i64>,
    next_command_id: Mutex<i64>,
    command_delay: Mutex<Option<Duration>>,
}

pub struct FakeSonarr {
    base_url: String,
    state: Arc<FakeState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakeSonarr {
    pub const API_KEY: &'static str = "fake-sonarr-api-key";

    /// Start the fake on an ephemeral localhost port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(FakeState {
            api_key: Self::API_KEY.to_string(),
            requests: Mutex::new(Vec::new()),
            series: Mutex::new(seed_series()),
            next_series_id: Mutex::new(5),
            next_command_id: Mutex::new(1000),
            command_delay: Mutex::new(None),
        });

        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        tokio::spawn(async move { server.await });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown: Some(shutdown_tx),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.state.api_key
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.state.requests.lock().len()
    }

    /// Delay `POST /api/v3/command` responses (to exercise client timeouts).
    pub fn set_command_delay(&self, delay: Duration) {
        *self.state.command_delay.lock() = Some(delay);
    }
}

impl Drop for FakeSonarr {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let query = uri.query().unwrap_or("").to_string();
    let body_json: Option<Value> = serde_json::from_slice(&body).ok();

    state.requests.lock().push(RecordedRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: query.clone(),
        api_key: api_key.clone(),
        body: body_json.clone(),
    });

    if api_key.as_deref() != Some(state.api_key.as_str()) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let params = parse_query(&query);
    let segments: Vec<&str> = uri.path().trim_matches('/').split('/').collect();

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["api", "v3", "series"]) => json_ok(&Value::Array(state.series.lock().clone())),
        ("POST", ["api", "v3", "series"]) => add_series(&state, body_json.unwrap_or(Value::Null)),
        ("GET", ["api", "v3", "series", "lookup"]) => {
            lookup(params.get("term").map_or("", String::as_str))
        }
        ("GET", ["api", "v3", "series", id]) => {
            let found = find_series(&state, id);
            found.map_or_else(not_found, |s| json_ok(&s))
        }
        ("GET", ["api", "v3", "episode", id]) => {
            episode(id).map_or_else(not_found, |e| json_ok(&e))
        }
        ("GET", ["api", "v3", "rootfolder"]) => {
            json_ok(&json!([{ "id": 1, "path": "/tv", "freeSpace": 1_000_000 }]))
        }
        ("GET", ["api", "v3", "qualityprofile"]) => {
            json_ok(&json!([{ "id": 4, "name": "HD-1080p" }, { "id": 1, "name": "Any" }]))
        }
        ("GET", ["api", "v3", "calendar"]) => json_ok(&calendar()),
        ("GET", ["api", "v3", "queue"]) => json_ok(&queue()),
        ("GET", ["api", "v3", "history"]) => json_ok(&history(&params)),
        ("POST", ["api", "v3", "command"]) => {
            let delay = *state.command_delay.lock();
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            command(&state, body_json.unwrap_or(Value::Null))
        }
        ("GET", ["api", "v3", "system", "status"]) => json_ok(&system_status()),
        ("GET", ["api", "v3", "health"]) => json_ok(&json!([{
            "source": "IndexerStatusCheck",
            "type": "warning",
            "message": "Indexers unavailable due to failures",
            "wikiUrl": "https://wiki.servarr.com/sonarr/system#indexers-are-unavailable-due-to-failures"
        }])),
        ("GET", ["MediaCover", id, "poster.jpg"]) => poster(&state, id),
        ("GET", ["MediaCover", _, "poster.txt"]) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            "not an image",
        )
            .into_response(),
        _ => not_found(),
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

fn json_ok(v: &Value) -> Response {
    (StatusCode::OK, axum::Json(v.clone())).into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(json!({ "message": "NotFound" })),
    )
        .into_response()
}

fn find_series(state: &FakeState, id: &str) -> Option<Value> {
    let id: i64 = id.parse().ok()?;
    state
        .series
        .lock()
        .iter()
        .find(|s| s["id"].as_i64() == Some(id))
        .cloned()
}

fn add_series(state: &FakeState, body: Value) -> Response {
    let Some(tvdb_id) = body["tvdbId"].as_i64() else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!([{
                "propertyName": "TvdbId",
                "errorMessage": "'Tvdb Id' must be greater than '0'.",
                "errorCode": "GreaterThanValidator"
            }])),
        )
            .into_response();
    };

    let mut series = state.series.lock();
    if series.iter().any(|s| s["tvdbId"].as_i64() == Some(tvdb_id)) {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!([{
                "propertyName": "TvdbId",
                "errorMessage": "This series has already been added",
                "attemptedValue": tvdb_id,
                "severity": "error",
                "errorCode": "SeriesExistsValidator"
            }])),
        )
            .into_response();
    }

    let id = {
        let mut next = state.next_series_id.lock();
        let id = *next;
        *next += 1;
        id
    };
    let title = body["title"].as_str().unwrap_or("Untitled").to_string();
    let root = body["rootFolderPath"].as_str().unwrap_or("/tv");
    let created = json!({
        "id": id,
        "title": title,
        "tvdbId": tvdb_id,
        "titleSlug": body["titleSlug"],
        "path": format!("{}/{}", root.trim_end_matches('/'), title),
        "monitored": body["monitored"].as_bool().unwrap_or(true),
        "qualityProfileId": body["qualityProfileId"],
        "seasons": body["seasons"].as_array().cloned().unwrap_or_default(),
        "images": body["images"].as_array().cloned().unwrap_or_default(),
        "status": "continuing",
        "statistics": { "episodeCount": 0, "episodeFileCount": 0, "sizeOnDisk": 0 },
        "genres": []
    });
    series.push(created.clone());
    (StatusCode::CREATED, axum::Json(created)).into_response()
}

fn lookup(term: &str) -> Response {
    let catalog = lookup_catalog();
    let results: Vec<Value> = if let Some(tvdb) = term.strip_prefix("tvdb:") {
        let tvdb: i64 = tvdb.trim().parse().unwrap_or(-1);
        catalog
            .into_iter()
            .filter(|s| s["tvdbId"].as_i64() == Some(tvdb))
            .collect()
    } else {
        let needle = term.to_lowercase();
        catalog
            .into_iter()
            .filter(|s| {
                s["title"]
                    .as_str()
                    .is_some_and(|t| t.to_lowercase().contains(&needle))
            })
            .collect()
    };
    json_ok(&Value::Array(results))
}

fn command(state: &FakeState, body: Value) -> Response {
    let id = {
        let mut next = state.next_command_id.lock();
        let id = *next;
        *next += 1;
        id
    };
    (
        StatusCode::CREATED,
        axum::Json(json!({
            "id": id,
            "name": body["name"],
            "commandName": "Series Search",
            "status": "queued",
            "queued": "2024-01-15T12:00:00Z",
            "body": body
        })),
    )
        .into_response()
}

fn poster(state: &FakeState, id: &str) -> Response {
    let has_poster = find_series(state, id).is_some_and(|s| {
        s["images"].as_array().is_some_and(|imgs| {
            imgs.iter()
                .any(|i| i["coverType"].as_str() == Some("poster"))
        })
    });
    if !has_poster {
        return not_found();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/jpeg")],
        POSTER_BYTES,
    )
        .into_response()
}

fn seed_series() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "title": "The Wire",
            "sortTitle": "wire",
            "status": "ended",
            "overview": "Told from the points of view of both the Baltimore homicide and narcotics detectives and their targets, the series captures a universe in which the national war on drugs has become a permanent, self-sustaining bureaucracy, and distinctions between good and evil are routinely obliterated. Each season examines a different facet of the city: the drug trade, the port system, city government and bureaucracy, education and schools, and the print news media. The series is notable for its realistic portrayal of urban life.",
            "network": "HBO",
            "airTime": "21:00",
            "runtime": 60,
            "year": 2002,
            "genres": ["Crime", "Drama", "Thriller", "Mystery"],
            "certification": "TV-MA",
            "imdbId": "tt0306414",
            "tvdbId": 79126,
            "monitored": true,
            "seasonFolder": true,
            "qualityProfileId": 1,
            "languageProfileId": 1,
            "path": "/tv/The Wire",
            "images": [
                { "coverType": "banner", "url": "/MediaCover/1/banner.jpg?lastWrite=637" },
                { "coverType": "poster", "url": "/MediaCover/1/poster.jpg?lastWrite=637" }
            ],
            "seasons": [
                { "seasonNumber": 1, "monitored": true, "statistics": { "episodeCount": 13, "episodeFileCount": 13 } },
                { "seasonNumber": 2, "monitored": true, "statistics": { "episodeCount": 12, "episodeFileCount": 10 } }
            ],
            "statistics": { "seasonCount": 2, "episodeCount": 25, "episodeFileCount": 23, "sizeOnDisk": 52_000_000_000_i64 }
        }),
        json!({
            "id": 2,
            "title": "Firefly",
            "sortTitle": "firefly",
            "status": "ended",
            "overview": "Five hundred years in the future, a renegade crew aboard a small spacecraft tries to survive.",
            "network": "FOX",
            "year": 2002,
            "genres": ["Drama", "Science Fiction"],
            "tvdbId": 78874,
            "monitored": false,
            "qualityProfileId": 4,
            "path": "/tv/Firefly",
            "images": [],
            "seasons": [
                { "seasonNumber": 1, "monitored": false, "statistics": { "episodeCount": 14, "episodeFileCount": 14 } }
            ],
            "statistics": { "seasonCount": 1, "episodeCount": 14, "episodeFileCount": 14, "sizeOnDisk": 9_000_000_000_i64 }
        }),
        // Poster entries whose media is missing (3) or not an image (4).
        json!({
            "id": 3,
            "title": "Deadwood",
            "status": "ended",
            "year": 2004,
            "tvdbId": 72023,
            "monitored": false,
            "qualityProfileId": 1,
            "path": "/tv/Deadwood",
            "images": [{ "coverType": "poster", "url": "/MediaCover/3/missing.jpg" }],
            "seasons": []
        }),
        json!({
            "id": 4,
            "title": "Carnivale",
            "status": "ended",
            "year": 2003,
            "tvdbId": 70860,
            "monitored": false,
            "qualityProfileId": 1,
            "path": "/tv/Carnivale",
            "images": [{ "coverType": "poster", "url": "/MediaCover/4/poster.txt" }],
            "seasons": []
        }),
    ]
}

fn lookup_catalog() -> Vec<Value> {
    vec![
        json!({
            "title": "Breaking Bad",
            "titleSlug": "breaking-bad",
            "year": 2008,
            "tvdbId": 81189,
            "imdbId": "tt0903747",
            "status": "ended",
            "network": "AMC",
            "runtime": 47,
            "overview": "A high school chemistry teacher diagnosed with terminal lung cancer turns to manufacturing methamphetamine.",
            "genres": ["Crime", "Drama", "Thriller", "Western"],
            "images": [{ "coverType": "poster", "url": "https://artworks.thetvdb.com/banners/posters/81189-10.jpg" }],
            "seasons": [
                { "seasonNumber": 0, "monitored": false },
                { "seasonNumber": 1, "monitored": true },
                { "seasonNumber": 2, "monitored": true }
            ]
        }),
        json!({
            "title": "The Wire",
            "titleSlug": "the-wire",
            "year": 2002,
            "tvdbId": 79126,
            "status": "ended",
            "network": "HBO",
            "genres": ["Crime", "Drama"],
            "images": [],
            "seasons": [{ "seasonNumber": 1, "monitored": true }]
        }),
        json!({
            "title": "Firefly",
            "titleSlug": "firefly",
            "year": 2002,
            "tvdbId": 78874,
            "status": "ended",
            "network": "FOX",
            "genres": ["Drama"],
            "images": [],
            "seasons": [{ "seasonNumber": 1, "monitored": true }]
        }),
    ]
}

fn episode(id: &str) -> Option<Value> {
    match id {
        "101" => Some(json!({
            "id": 101,
            "seriesId": 1,
            "seasonNumber": 1,
            "episodeNumber": 1,
            "title": "The Target",
            "airDate": "2024-01-10",
            "airDateUtc": "2024-01-11T02:00:00Z",
            "overview": "Detective McNulty sets a plan in motion.",
            "hasFile": true,
            "monitored": true,
            "series": { "id": 1, "title": "The Wire" },
            "episodeFile": {
                "id": 501,
                "relativePath": "Season 01/The Wire - S01E01 - The Target.mkv",
                "path": "/tv/The Wire/Season 01/The Wire - S01E01 - The Target.mkv",
                "size": 1_500_000_000_i64,
                "quality": { "quality": { "id": 4, "name": "HDTV-720p" } },
                "mediaInfo": { "videoCodec": "x264", "audioChannels": 2.0 }
            }
        })),
        "102" => Some(json!({
            "id": 102,
            "seriesId": 2,
            "seasonNumber": 1,
            "episodeNumber": 2,
            "title": "The Train Job",
            "airDate": "2024-01-05",
            "airDateUtc": "2024-01-06T01:00:00Z",
            "overview": "",
            "hasFile": false,
            "monitored": false,
            "series": { "id": 2, "title": "Firefly" }
        })),
        _ => None,
    }
}

fn calendar() -> Value {
    Value::Array(
        ["101", "102"]
            .iter()
            .filter_map(|id| episode(id))
            .collect(),
    )
}

fn queue() -> Value {
    json!({
        "page": 1,
        "pageSize": 10,
        "totalRecords": 2,
        "records": [
            {
                "id": 11,
                "series": { "title": "The Wire" },
                "episode": { "title": "Mission", "seasonNumber": 2, "episodeNumber": 3 },
                "quality": { "quality": { "name": "HDTV-720p" } },
                "size": 1000.0,
                "sizeleft": 250.0,
                "status": "downloading",
                "trackedDownloadStatus": "ok",
                "downloadClient": "SABnzbd",
                "outputPath": "/downloads/The.Wire.S02E03"
            },
            {
                "id": 12,
                "series": { "title": "Firefly" },
                "episode": { "title": "Serenity", "seasonNumber": 1, "episodeNumber": 1 },
                "quality": { "quality": { "name": "Bluray-1080p" } },
                "size": 500.0,
                "sizeleft": 0.0,
                "status": "completed",
                "trackedDownloadStatus": "ok",
                "downloadClient": "SABnzbd"
            }
        ]
    })
}

fn history(params: &HashMap<String, String>) -> Value {
    let page: i64 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let page_size: i64 = params
        .get("pageSize")
        .and_then(|p| p.parse().ok())
        .unwrap_or(10);
    json!({
        "page": page,
        "pageSize": page_size,
        "sortKey": "date",
        "sortDirection": "descending",
        "totalRecords": 1,
        "records": [{
            "id": 900,
            "episodeId": 101,
            "seriesId": 1,
            "sourceTitle": "The.Wire.S01E01.720p.HDTV",
            "quality": { "quality": { "name": "HDTV-720p" } },
            "date": "2024-01-11T03:00:00Z",
            "eventType": "downloadFolderImported",
            "data": { "downloadClient": "SABnzbd" },
            "series": { "title": "The Wire" },
            "episode": { "title": "The Target", "seasonNumber": 1, "episodeNumber": 1 }
        }]
    })
}

fn system_status() -> Value {
    json!({
        "appName": "Sonarr",
        "version": "3.0.10.1567",
        "buildTime": "2023-01-01T00:00:00Z",
        "isDebug": false,
        "isProduction": true,
        "isAdmin": false,
        "isUserInteractive": false,
        "startupPath": "/app/sonarr/bin",
        "appData": "/config",
        "osName": "ubuntu",
        "osVersion": "22.04",
        "branch": "main",
        "authentication": "forms",
        "migrationVersion": 190,
        "urlBase": "",
        "runtimeVersion": "6.0.13"
    })
}

#[cfg(test)]
mod tests {
    use super::parse_query;

    #[test]
    fn query_decodes_percent_and_plus() {
        let params = parse_query("term=tvdb%3A81189&title=breaking+bad&empty=");
        assert_eq!(params.get("term").map(String::as_str), Some("tvdb:81189"));
        assert_eq!(params.get("title").map(String::as_str), Some("breaking bad"));
        assert_eq!(params.get("empty").map(String::as_str), Some(""));
    }
}
