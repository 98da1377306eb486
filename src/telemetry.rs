use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::battery::{self, Adc, PowerReading, VoltCalibration};
use crate::buffer::EventBuffer;
use crate::clock::Clock;
use crate::connectivity::LinkState;
use crate::net::Transport;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiValue {
    Int(i64),
    Float(f64),
}

/// One named, timestamped metric as it appears on the wire.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    pub key_name: &'static str,
    pub key_value: KpiValue,
    pub epoch: i64,
}

#[derive(Debug, Serialize)]
pub struct KpiBatch {
    pub kpis: Vec<Kpi>,
}

/// Lays out one upload attempt: a `tip` entry per buffered event in capture
/// order, each stamped with its own epoch, then the three battery readings
/// stamped with the sample time.
pub fn build_batch(events: &[i64], reading: PowerReading, now: i64) -> KpiBatch {
    let mut kpis = Vec::with_capacity(events.len() + 3);
    for &epoch in events {
        kpis.push(Kpi {
            key_name: "tip",
            key_value: KpiValue::Int(1),
            epoch,
        });
    }
    kpis.push(Kpi {
        key_name: "volt",
        key_value: KpiValue::Float(round2(reading.volts)),
        epoch: now,
    });
    kpis.push(Kpi {
        key_name: "volt-pin",
        key_value: KpiValue::Int(i64::from(reading.raw)),
        epoch: now,
    });
    kpis.push(Kpi {
        key_name: "batt",
        key_value: KpiValue::Int(reading.batt_percent),
        epoch: now,
    });
    KpiBatch { kpis }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("link is down")]
    LinkDown,
    #[error("no access token held")]
    NoToken,
    #[error("upload transport error: {0}")]
    Transport(#[from] anyhow::Error),
    #[error("upload rejected with status {status}")]
    Rejected { status: u16 },
}

#[derive(Debug, PartialEq)]
pub struct UploadReceipt {
    pub status: u16,
    pub kpis_sent: usize,
    pub events_cleared: usize,
}

pub struct Uploader<A: Adc, C: Clock> {
    device_name: String,
    calibration: VoltCalibration,
    adc: A,
    clock: C,
}

impl<A: Adc, C: Clock> Uploader<A, C> {
    pub fn new(device_name: String, calibration: VoltCalibration, adc: A, clock: C) -> Self {
        Self {
            device_name,
            calibration,
            adc,
            clock,
        }
    }

    /// One upload attempt. Requires the link up and a cached token, or the
    /// failure is reported without touching the network. The event buffer is
    /// cleared only when the server accepted a batch that included events;
    /// any other outcome leaves it intact so the same events go out again,
    /// in the same order, on the next cycle. The battery readings are
    /// point-in-time and are never retried.
    pub async fn upload_batch<T: Transport>(
        &mut self,
        transport: &T,
        link: LinkState,
        session: &Session,
        buffer: &EventBuffer,
        include_events: bool,
    ) -> Result<UploadReceipt, UploadError> {
        if link != LinkState::Up {
            return Err(UploadError::LinkDown);
        }
        let Some(token) = session.token() else {
            return Err(UploadError::NoToken);
        };

        let reading = battery::derive_reading(self.adc.read_raw(), self.calibration);
        let now = self.clock.now();
        let events = if include_events {
            buffer.snapshot()
        } else {
            Vec::new()
        };
        let batch = build_batch(&events, reading, now);
        info!(
            events = events.len(),
            kpis = batch.kpis.len(),
            volts = reading.volts,
            "uploading batch"
        );

        let path = format!("/kpis/{}", self.device_name);
        let response = transport.post_json(&path, &batch, Some(token)).await?;
        if !response.is_success() {
            warn!(
                status = response.status,
                body = %response.body,
                "upload rejected, keeping buffered events"
            );
            return Err(UploadError::Rejected {
                status: response.status,
            });
        }

        let events_cleared = if include_events {
            buffer.clear();
            events.len()
        } else {
            0
        };
        Ok(UploadReceipt {
            status: response.status,
            kpis_sent: batch.kpis.len(),
            events_cleared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ApiResponse;
    use anyhow::anyhow;
    use serde_json::{json, Value};
    use std::cell::RefCell;

    struct FakeAdc(u16);

    impl Adc for FakeAdc {
        fn read_raw(&mut self) -> u16 {
            self.0
        }
    }

    struct FakeClock(i64);

    impl Clock for FakeClock {
        fn now(&self) -> i64 {
            self.0
        }
    }

    struct FakeTransport {
        status: u16,
        fail: bool,
        calls: RefCell<Vec<(String, Value, Option<String>)>>,
    }

    impl FakeTransport {
        fn replying(status: u16) -> Self {
            Self {
                status,
                fail: false,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn unreachable_host() -> Self {
            Self {
                status: 0,
                fail: true,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for FakeTransport {
        async fn post_json<B: Serialize + ?Sized>(
            &self,
            path: &str,
            body: &B,
            bearer: Option<&str>,
        ) -> anyhow::Result<ApiResponse> {
            self.calls.borrow_mut().push((
                path.to_string(),
                serde_json::to_value(body)?,
                bearer.map(String::from),
            ));
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            Ok(ApiResponse {
                status: self.status,
                body: String::new(),
            })
        }
    }

    fn uploader() -> Uploader<FakeAdc, FakeClock> {
        // 515 counts -> 3.70 V, 70 % with the default calibration.
        Uploader::new(
            "gauge-1".to_string(),
            VoltCalibration::default(),
            FakeAdc(515),
            FakeClock(1_700_000_000),
        )
    }

    #[test]
    fn batch_without_events_holds_exactly_the_three_readings() {
        let reading = battery::derive_reading(515, VoltCalibration::default());
        let batch = build_batch(&[], reading, 999);
        let names: Vec<&str> = batch.kpis.iter().map(|k| k.key_name).collect();
        assert_eq!(names, vec!["volt", "volt-pin", "batt"]);
        assert!(batch.kpis.iter().all(|k| k.epoch == 999));
    }

    #[test]
    fn batch_leads_with_tips_in_capture_order() {
        let reading = battery::derive_reading(515, VoltCalibration::default());
        let batch = build_batch(&[100, 105], reading, 200);
        assert_eq!(batch.kpis.len(), 5);
        assert_eq!(
            batch.kpis[0],
            Kpi {
                key_name: "tip",
                key_value: KpiValue::Int(1),
                epoch: 100
            }
        );
        assert_eq!(
            batch.kpis[1],
            Kpi {
                key_name: "tip",
                key_value: KpiValue::Int(1),
                epoch: 105
            }
        );
    }

    #[test]
    fn batch_serializes_to_the_wire_shape() {
        let reading = battery::derive_reading(515, VoltCalibration::default());
        let batch = build_batch(&[100], reading, 200);
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(
            value["kpis"][0],
            json!({"keyName": "tip", "keyValue": 1, "epoch": 100})
        );
        assert_eq!(
            value["kpis"][1],
            json!({"keyName": "volt", "keyValue": 3.7, "epoch": 200})
        );
        assert_eq!(
            value["kpis"][2],
            json!({"keyName": "volt-pin", "keyValue": 515, "epoch": 200})
        );
        assert_eq!(
            value["kpis"][3],
            json!({"keyName": "batt", "keyValue": 70, "epoch": 200})
        );
    }

    #[tokio::test]
    async fn accepted_upload_clears_the_buffer() {
        let transport = FakeTransport::replying(201);
        let buffer = EventBuffer::new();
        buffer.capture(100);
        buffer.capture(105);
        let session = Session::with_token("tok");

        let receipt = uploader()
            .upload_batch(&transport, LinkState::Up, &session, &buffer, true)
            .await
            .unwrap();

        assert_eq!(receipt.kpis_sent, 5);
        assert_eq!(receipt.events_cleared, 2);
        assert!(buffer.is_empty());

        let calls = transport.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (path, body, bearer) = &calls[0];
        assert_eq!(path, "/kpis/gauge-1");
        assert_eq!(bearer.as_deref(), Some("tok"));
        assert_eq!(body["kpis"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn rejected_upload_keeps_the_buffer_for_retry() {
        let transport = FakeTransport::replying(500);
        let buffer = EventBuffer::new();
        buffer.capture(100);
        let session = Session::with_token("tok");

        let err = uploader()
            .upload_batch(&transport, LinkState::Up, &session, &buffer, true)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Rejected { status: 500 }));
        assert_eq!(buffer.snapshot(), vec![100]);
    }

    #[tokio::test]
    async fn transport_failure_keeps_the_buffer_for_retry() {
        let transport = FakeTransport::unreachable_host();
        let buffer = EventBuffer::new();
        buffer.capture(100);
        let session = Session::with_token("tok");

        let err = uploader()
            .upload_batch(&transport, LinkState::Up, &session, &buffer, true)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Transport(_)));
        assert_eq!(buffer.snapshot(), vec![100]);
    }

    #[tokio::test]
    async fn no_token_short_circuits_before_the_network() {
        let transport = FakeTransport::replying(200);
        let buffer = EventBuffer::new();
        let session = Session::new();

        let err = uploader()
            .upload_batch(&transport, LinkState::Up, &session, &buffer, true)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::NoToken));
        assert!(transport.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn link_down_short_circuits_before_the_network() {
        let transport = FakeTransport::replying(200);
        let buffer = EventBuffer::new();
        let session = Session::with_token("tok");

        let err = uploader()
            .upload_batch(&transport, LinkState::Down, &session, &buffer, true)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::LinkDown));
        assert!(transport.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn excluding_events_never_clears_the_buffer() {
        let transport = FakeTransport::replying(200);
        let buffer = EventBuffer::new();
        buffer.capture(100);
        let session = Session::with_token("tok");

        let receipt = uploader()
            .upload_batch(&transport, LinkState::Up, &session, &buffer, false)
            .await
            .unwrap();

        assert_eq!(receipt.kpis_sent, 3);
        assert_eq!(receipt.events_cleared, 0);
        assert_eq!(buffer.snapshot(), vec![100]);
    }
}
