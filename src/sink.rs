use prometheus::{Encoder, GaugeVec, Opts, TextEncoder};
use tracing::error;

/// A price record joined with whatever station metadata was available.
/// Metadata fields stay empty when the registry has no matching station.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedTuple {
    pub station_id: i64,
    pub fuel_type: String,
    pub price: f64,
    pub self_service: bool,
    pub name: String,
    pub station_type: String,
    pub municipality: String,
    pub province: String,
    pub brand: String,
}

/// Receives one joined tuple per price record per refresh. A repeated label
/// set overwrites the previously observed value; nothing accumulates here.
pub trait MetricSink {
    fn observe(&self, tuple: &JoinedTuple);
}

/// The exported gauge, keyed by the full label tuple.
pub struct PriceGauge {
    gauge: GaugeVec,
}

impl PriceGauge {
    /// Create the gauge and register it with the default registry. Failure
    /// to register is fatal at startup.
    pub fn register() -> Result<Self, prometheus::Error> {
        let gauge = GaugeVec::new(
            Opts::new(
                "fuel_price_observation",
                "Observed fuel prices by station and fuel type",
            ),
            &[
                "station_id",
                "fuel_type",
                "self_service",
                "name",
                "type",
                "municipality",
                "province",
                "brand",
            ],
        )?;
        prometheus::register(Box::new(gauge.clone()))?;
        Ok(Self { gauge })
    }
}

impl MetricSink for PriceGauge {
    fn observe(&self, t: &JoinedTuple) {
        let station_id = t.station_id.to_string();
        let self_service = if t.self_service { "true" } else { "false" };
        self.gauge
            .with_label_values(&[
                &station_id,
                &t.fuel_type,
                self_service,
                &t.name,
                &t.station_type,
                &t.municipality,
                &t.province,
                &t.brand,
            ])
            .set(t.price);
    }
}

/// Render every metric in the default registry in the Prometheus text
/// exposition format.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buf) {
        error!("failed to encode metrics: {e}");
    }
    String::from_utf8(buf).unwrap_or_default()
}
