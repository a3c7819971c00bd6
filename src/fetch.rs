//! Retrieval of alerts from the alertmanager v2 api.
//!
//! [spawn_producer] runs the retrieval on its own task and hands the alerts
//! one by one to the consumer through the [handoff](crate::handoff) relay.
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::{
	alert::RawAlert,
	handoff::{self, AlertSender, AlertStream, Disconnected},
	settings::Settings,
};

/// Errors occurring while fetching alerts
#[derive(Debug, Error)]
pub enum FetchError {
	/// the configured url can't have path segments appended
	#[error("alertmanager url {0} can't be used as base url")]
	InvalidBaseUrl(Url),
	/// transport failure, timeout or non success status code
	#[error("request to alertmanager failed: {0}")]
	Request(#[from] reqwest::Error),
	/// the response body is neither an array of alerts nor wrapped in `data`
	#[error("failed to decode alertmanager response: {0}")]
	Decode(#[from] serde_json::Error),
}

/// which alerts to ask alertmanager for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertQuery {
	/// alerts that are firing and neither silenced nor inhibited
	Active,
	/// alerts that are silenced or inhibited
	Suppressed,
}

impl AlertQuery {
	/// query string parameters of the alerts endpoint
	fn params(self) -> [(&'static str, &'static str); 4] {
		match self {
			Self::Active => [
				("active", "true"),
				("silenced", "false"),
				("inhibited", "false"),
				("unprocessed", "false"),
			],
			Self::Suppressed => [
				("active", "false"),
				("silenced", "true"),
				("inhibited", "true"),
				("unprocessed", "false"),
			],
		}
	}
}

/// Something alerts can be fetched from
#[async_trait]
pub trait AlertSource: Send + Sync + 'static {
	async fn alerts(&self, query: AlertQuery) -> Result<Vec<RawAlert>, FetchError>;
}

#[derive(Debug, Clone)]
/// http client for the alertmanager alerts endpoint
pub struct AlertClient {
	client: reqwest::Client,
	endpoint: Url,
	token: Option<String>,
}

impl AlertClient {
	pub fn new(settings: &Settings) -> Result<Self, FetchError> {
		let client = reqwest::Client::builder().timeout(settings.http_timeout).build()?;

		Ok(Self {
			client,
			endpoint: alerts_endpoint(&settings.url)?,
			token: settings.token.clone(),
		})
	}
}

#[async_trait]
impl AlertSource for AlertClient {
	async fn alerts(&self, query: AlertQuery) -> Result<Vec<RawAlert>, FetchError> {
		let mut url = self.endpoint.clone();
		url.query_pairs_mut().extend_pairs(query.params());

		tracing::debug!(%url, ?query, "fetching alerts");

		let mut request = self
			.client
			.get(url)
			.header(ACCEPT, "application/json")
			.header(ACCEPT_ENCODING, "identity");

		if let Some(token) = &self.token {
			request = request.bearer_auth(token);
		}

		let body = request.send().await?.error_for_status()?.bytes().await?;

		tracing::debug!(bytes = body.len(), ?query, "received alertmanager response");

		decode(&body)
	}
}

/// `<base>/api/v2/alerts`, keeping any path prefix of `base`
fn alerts_endpoint(base: &Url) -> Result<Url, FetchError> {
	let mut url = base.clone();

	url.path_segments_mut()
		.map_err(|()| FetchError::InvalidBaseUrl(base.clone()))?
		.pop_if_empty()
		.extend(["api", "v2", "alerts"]);

	Ok(url)
}

/// alertmanager v2 returns a bare array, v1 wraps it into `data`
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
	Alerts(Vec<Value>),
	Envelope { data: Vec<Value> },
}

/// Decodes a response body. Entries that aren't valid alerts are skipped so
/// one malformed alert doesn't hide all others.
fn decode(body: &[u8]) -> Result<Vec<RawAlert>, FetchError> {
	let payload: Payload = serde_json::from_slice(body).map_err(|err| {
		tracing::debug!(body = %String::from_utf8_lossy(body), "undecodable alertmanager response");
		err
	})?;

	let entries = match payload {
		Payload::Alerts(entries) | Payload::Envelope { data: entries } => entries,
	};

	let alerts = entries
		.into_iter()
		.enumerate()
		.filter_map(|(position, entry)| match serde_json::from_value(entry) {
			Ok(alert) => Some(alert),
			Err(err) => {
				tracing::warn!(position, "skipping undecodable alert: {err}");
				None
			}
		})
		.collect();

	Ok(alerts)
}

/// Starts fetching on a new task and returns the stream the alerts arrive on.
///
/// Suppressed alerts are fetched first, only to log how many there are. Errors
/// are logged, in any case the stream ends after the last alert.
pub fn spawn_producer<S: AlertSource>(source: S) -> AlertStream {
	let (tx, stream) = handoff::channel();

	tokio::spawn(produce(source, tx));

	stream
}

async fn produce<S: AlertSource>(source: S, tx: AlertSender) {
	match source.alerts(AlertQuery::Suppressed).await {
		Ok(suppressed) => tracing::info!(count = suppressed.len(), "fetched suppressed alerts"),
		Err(err) => tracing::warn!("could not fetch suppressed alerts from alertmanager: {err}"),
	}

	let alerts = match source.alerts(AlertQuery::Active).await {
		Ok(alerts) => alerts,
		Err(err) => {
			tracing::error!("could not fetch alerts from alertmanager: {err}");
			return;
		}
	};

	tracing::info!(count = alerts.len(), "fetched active alerts");

	for alert in alerts {
		if let Err(Disconnected(alert)) = tx.send(alert).await {
			tracing::debug!(alert = alert.name(), "alert consumer went away, dropping remaining alerts");
			break;
		}
	}
}

#[cfg(test)]
mod tests {
	use std::{
		sync::{Arc, Mutex},
		time::Duration,
	};

	use futures::StreamExt;
	use serde_json::json;
	use wiremock::{
		matchers::{header, method, path, query_param},
		Mock, MockServer, ResponseTemplate,
	};

	use super::*;

	fn alert_json(name: &str) -> Value {
		json!({
			"labels": { "alertname": name, "severity": "high" },
			"annotations": { "summary": "something broke" },
			"startsAt": "2021-01-01T00:00:00Z",
			"endsAt": "2021-01-02T00:00:00Z",
		})
	}

	fn settings_for(server: &MockServer, token: Option<&str>) -> Settings {
		Settings {
			url: Url::parse(&format!("{}/alertmanager", server.uri())).unwrap(),
			http_timeout: Duration::from_secs(2),
			token: token.map(str::to_owned),
			..Settings::default()
		}
	}

	#[test]
	fn endpoint_keeps_path_prefix() {
		let base = Url::parse("https://cms-monitoring.cern.ch/alertmanager").unwrap();
		assert_eq!(
			alerts_endpoint(&base).unwrap().as_str(),
			"https://cms-monitoring.cern.ch/alertmanager/api/v2/alerts"
		);

		let base = Url::parse("http://localhost:9093/").unwrap();
		assert_eq!(alerts_endpoint(&base).unwrap().as_str(), "http://localhost:9093/api/v2/alerts");
	}

	#[test]
	fn decodes_bare_and_wrapped_payloads() {
		let bare = serde_json::to_vec(&json!([alert_json("a"), alert_json("b")])).unwrap();
		let wrapped = serde_json::to_vec(&json!({ "status": "success", "data": [alert_json("c")] })).unwrap();

		let names = |alerts: Vec<RawAlert>| alerts.iter().map(|a| a.name().to_owned()).collect::<Vec<_>>();

		assert_eq!(names(decode(&bare).unwrap()), ["a", "b"]);
		assert_eq!(names(decode(&wrapped).unwrap()), ["c"]);
	}

	#[test]
	fn skips_malformed_entries() {
		let body = serde_json::to_vec(&json!([
			alert_json("good"),
			{ "labels": { "alertname": "no-timestamps" } },
			alert_json("also-good"),
		]))
		.unwrap();

		let alerts = decode(&body).unwrap();

		assert_eq!(alerts.len(), 2);
		assert_eq!(alerts[1].name(), "also-good");
	}

	#[test]
	fn rejects_garbage() {
		assert!(matches!(decode(b"<html>bad gateway</html>"), Err(FetchError::Decode(_))));
	}

	#[tokio::test]
	async fn fetches_active_alerts_with_token() {
		let server = MockServer::start().await;

		Mock::given(method("GET"))
			.and(path("/alertmanager/api/v2/alerts"))
			.and(query_param("active", "true"))
			.and(query_param("silenced", "false"))
			.and(query_param("inhibited", "false"))
			.and(header("authorization", "Bearer secret"))
			.and(header("accept", "application/json"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!([alert_json("a")])))
			.expect(1)
			.mount(&server)
			.await;

		let client = AlertClient::new(&settings_for(&server, Some("secret"))).unwrap();
		let alerts = client.alerts(AlertQuery::Active).await.unwrap();

		assert_eq!(alerts.len(), 1);
		assert_eq!(alerts[0].label_str("severity"), Some("high"));
	}

	#[tokio::test]
	async fn server_errors_are_request_errors() {
		let server = MockServer::start().await;

		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(500))
			.mount(&server)
			.await;

		let client = AlertClient::new(&settings_for(&server, None)).unwrap();

		assert!(matches!(client.alerts(AlertQuery::Active).await, Err(FetchError::Request(_))));
	}

	#[tokio::test]
	async fn suppressed_failure_does_not_stop_active_fetch() {
		let server = MockServer::start().await;

		Mock::given(method("GET"))
			.and(query_param("silenced", "true"))
			.respond_with(ResponseTemplate::new(503))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(query_param("active", "true"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!([alert_json("a"), alert_json("b")])))
			.expect(1)
			.mount(&server)
			.await;

		let client = AlertClient::new(&settings_for(&server, None)).unwrap();
		let alerts: Vec<RawAlert> = spawn_producer(client).collect().await;

		assert_eq!(alerts.len(), 2);
	}

	/// records the queries it was asked and answers with canned results
	struct Canned {
		queries: Arc<Mutex<Vec<AlertQuery>>>,
		active: fn() -> Result<Vec<RawAlert>, FetchError>,
	}

	#[async_trait]
	impl AlertSource for Canned {
		async fn alerts(&self, query: AlertQuery) -> Result<Vec<RawAlert>, FetchError> {
			self.queries.lock().unwrap().push(query);
			match query {
				AlertQuery::Suppressed => Ok(vec![]),
				AlertQuery::Active => (self.active)(),
			}
		}
	}

	#[tokio::test]
	async fn producer_fetches_suppressed_first() {
		let queries = Arc::new(Mutex::new(Vec::new()));
		let source = Canned {
			queries: queries.clone(),
			active: || Ok(vec![serde_json::from_value(alert_json("a")).unwrap()]),
		};

		let alerts: Vec<RawAlert> = spawn_producer(source).collect().await;

		assert_eq!(alerts.len(), 1);
		assert_eq!(*queries.lock().unwrap(), [AlertQuery::Suppressed, AlertQuery::Active]);
	}

	#[tokio::test]
	async fn failed_fetch_closes_stream_empty() {
		let source = Canned {
			queries: Arc::default(),
			active: || Err(FetchError::Decode(serde_json::from_str::<Value>("{").unwrap_err())),
		};

		let mut stream = spawn_producer(source);

		assert!(stream.next().await.is_none());
	}
}
