//! Single slot relay between the task fetching alerts and the task
//! aggregating them.
//!
//! The relay holds at most one alert. [AlertSender::send] suspends while the
//! slot is occupied, [AlertStream] suspends while it is empty. Dropping the
//! sender closes the relay, the stream ends once the last alert was taken.
use std::{
	pin::Pin,
	task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;

use crate::alert::RawAlert;

/// construct a connected sender/stream pair
pub fn channel() -> (AlertSender, AlertStream) {
	let (tx, rx) = mpsc::channel(1);

	(AlertSender(tx), AlertStream(rx))
}

/// Producing half of the relay
#[derive(Debug)]
pub struct AlertSender(mpsc::Sender<RawAlert>);

/// the consuming half was dropped before the stream was drained
#[derive(Debug, thiserror::Error)]
#[error("alert stream consumer went away")]
pub struct Disconnected(pub RawAlert);

impl AlertSender {
	/// Hands `alert` to the consumer, waits until the slot is free.
	pub async fn send(&self, alert: RawAlert) -> Result<(), Disconnected> {
		self.0.send(alert).await.map_err(|mpsc::error::SendError(alert)| Disconnected(alert))
	}
}

/// Consuming half of the relay. A finite stream of alerts in the order they
/// were sent.
#[derive(Debug)]
pub struct AlertStream(mpsc::Receiver<RawAlert>);

impl Stream for AlertStream {
	type Item = RawAlert;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		self.0.poll_recv(cx)
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use futures::StreamExt;
	use serde_json::json;

	use super::*;

	fn alert(name: &str) -> RawAlert {
		serde_json::from_value(json!({
			"labels": { "alertname": name },
			"startsAt": "2021-01-01T00:00:00Z",
			"endsAt": "2021-01-02T00:00:00Z",
		}))
		.unwrap()
	}

	#[tokio::test]
	async fn delivers_in_order_and_ends_on_close() {
		let (tx, stream) = channel();

		tokio::spawn(async move {
			for name in ["a", "b", "c"] {
				tx.send(alert(name)).await.unwrap();
			}
		});

		let names: Vec<String> = stream.map(|alert| alert.name().to_owned()).collect().await;

		assert_eq!(names, ["a", "b", "c"]);
	}

	#[tokio::test]
	async fn producer_waits_for_free_slot() {
		let (tx, mut stream) = channel();

		tx.send(alert("first")).await.unwrap();

		// slot is occupied until the consumer takes the first alert
		let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(alert("second"))).await;
		assert!(blocked.is_err());

		assert_eq!(stream.next().await.map(|alert| alert.name().to_owned()).as_deref(), Some("first"));
		tx.send(alert("third")).await.unwrap();
		drop(tx);

		assert_eq!(stream.next().await.map(|alert| alert.name().to_owned()).as_deref(), Some("third"));
		assert!(stream.next().await.is_none());
	}

	#[tokio::test]
	async fn send_fails_once_consumer_is_gone() {
		let (tx, stream) = channel();
		drop(stream);

		let Disconnected(returned) = tx.send(alert("orphan")).await.unwrap_err();
		assert_eq!(returned.name(), "orphan");
	}
}
