use std::{collections::HashMap, sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    cache::RecordCache,
    feed::{
        FeedError,
        prices::{PriceRecord, parse_prices},
        stations::{Station, parse_stations},
    },
    sink::{JoinedTuple, MetricSink},
};

/// Where the raw feed bodies come from. A seam rather than a direct
/// reqwest call so the refresh sequence can be driven from canned bytes.
pub trait FeedSource {
    async fn fetch_prices(&self) -> Result<Vec<u8>, FeedError>;
    async fn fetch_stations(&self) -> Result<Vec<u8>, FeedError>;
}

/// Full-body HTTP fetch of both feeds. No authentication, no pagination;
/// timeouts are whatever the transport defaults to.
pub struct HttpFeedSource {
    client: reqwest::Client,
    prices_url: String,
    stations_url: String,
}

impl HttpFeedSource {
    pub fn new(prices_url: String, stations_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            prices_url,
            stations_url,
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| FeedError::Fetch(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| FeedError::Fetch(e.to_string()))?;
        Ok(body.to_vec())
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch_prices(&self) -> Result<Vec<u8>, FeedError> {
        self.fetch(&self.prices_url).await
    }

    async fn fetch_stations(&self) -> Result<Vec<u8>, FeedError> {
        self.fetch(&self.stations_url).await
    }
}

/// Join each price record against the station table. A record with no
/// matching station keeps empty metadata rather than being dropped.
pub fn join(records: &[PriceRecord], stations: &HashMap<i64, Station>) -> Vec<JoinedTuple> {
    records
        .iter()
        .map(|r| {
            let mut tuple = JoinedTuple {
                station_id: r.station_id,
                fuel_type: r.fuel_type.clone(),
                price: r.price,
                self_service: r.self_service,
                ..JoinedTuple::default()
            };
            if let Some(station) = stations.get(&r.station_id) {
                tuple.name = station.name.clone();
                tuple.station_type = station.station_type.as_str().to_owned();
                tuple.municipality = station.municipality.clone();
                tuple.province = station.province.clone();
                tuple.brand = station.brand.clone();
            }
            tuple
        })
        .collect()
}

/// Drives the fetch-parse-cache-join-emit cycle.
pub struct Refresher<S, M> {
    source: S,
    cache: Arc<RecordCache>,
    sink: M,
}

impl<S: FeedSource, M: MetricSink> Refresher<S, M> {
    pub fn new(source: S, cache: Arc<RecordCache>, sink: M) -> Self {
        Self {
            source,
            cache,
            sink,
        }
    }

    /// Run forever, one refresh per `interval`. A failed iteration is
    /// logged and abandoned; the next one starts the sequence fresh.
    pub async fn run(self, interval: Duration) {
        loop {
            match self.refresh_once().await {
                Ok(emitted) => info!("refreshed {emitted} price observations"),
                Err(e) => warn!("refresh failed: {e}"),
            }
            info!("sleeping for {interval:?}");
            tokio::time::sleep(interval).await;
        }
    }

    /// One fetch-parse-cache-join-emit pass. Price records land in the
    /// cache as they parse, so a failure in the later station fetch leaves
    /// the cache populated while emitting nothing.
    async fn refresh_once(&self) -> Result<usize, FeedError> {
        let body = self.source.fetch_prices().await?;
        let records = parse_prices(body.as_slice(), &self.cache)?;

        let body = self.source.fetch_stations().await?;
        let stations = parse_stations(body.as_slice())?;

        let tuples = join(&records, &stations);
        for tuple in &tuples {
            self.sink.observe(tuple);
        }
        Ok(tuples.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::feed::stations::StationType;

    const PRICE_FEED: &str = "Estrazione del 5/3/2024\n\
                              idImpianto;descCarburante;prezzo;isSelf;dtComu\n\
                              101;benzina;1.899;true;5/3/2024 8:00:00\n";
    const STATION_FEED: &str = "Gestore;Bandiera;Tipo Impianto;Nome Impianto\n\
                                101;Rossi Carburanti Srl;AGIP;roadside;Stazione Roma Nord;Via Salaria 10;Roma;RM;41.98;12.51\n";

    struct StaticSource {
        prices: Option<&'static str>,
        stations: Option<&'static str>,
    }

    impl FeedSource for StaticSource {
        async fn fetch_prices(&self) -> Result<Vec<u8>, FeedError> {
            match self.prices {
                Some(body) => Ok(body.as_bytes().to_vec()),
                None => Err(FeedError::Fetch("connection refused".to_owned())),
            }
        }

        async fn fetch_stations(&self) -> Result<Vec<u8>, FeedError> {
            match self.stations {
                Some(body) => Ok(body.as_bytes().to_vec()),
                None => Err(FeedError::Fetch("connection refused".to_owned())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<JoinedTuple>>);

    impl MetricSink for RecordingSink {
        fn observe(&self, tuple: &JoinedTuple) {
            self.0.lock().unwrap().push(tuple.clone());
        }
    }

    fn station(id: i64) -> Station {
        Station {
            id,
            operator: "Rossi Carburanti Srl".into(),
            brand: "AGIP".into(),
            station_type: StationType::Roadside,
            name: "Stazione Roma Nord".into(),
            address: "Via Salaria 10".into(),
            municipality: "Roma".into(),
            province: "RM".into(),
            lat: "41.98".into(),
            lon: "12.51".into(),
        }
    }

    fn record(station_id: i64) -> PriceRecord {
        PriceRecord {
            station_id,
            fuel_type: "benzina".into(),
            price: 1.899,
            self_service: true,
            observed_at: NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn join_hit_populates_all_metadata_fields() {
        let stations = HashMap::from([(101, station(101))]);
        let tuples = join(&[record(101)], &stations);

        assert_eq!(tuples.len(), 1);
        let t = &tuples[0];
        assert_eq!(t.name, "Stazione Roma Nord");
        assert_eq!(t.station_type, "roadside");
        assert_eq!(t.municipality, "Roma");
        assert_eq!(t.province, "RM");
        assert_eq!(t.brand, "AGIP");
    }

    #[test]
    fn join_miss_keeps_the_record_with_empty_metadata() {
        let tuples = join(&[record(999)], &HashMap::new());

        assert_eq!(tuples.len(), 1);
        let t = &tuples[0];
        assert_eq!(t.station_id, 999);
        assert_eq!(t.price, 1.899);
        assert!(t.name.is_empty());
        assert!(t.station_type.is_empty());
        assert!(t.municipality.is_empty());
        assert!(t.province.is_empty());
        assert!(t.brand.is_empty());
    }

    #[tokio::test]
    async fn one_iteration_joins_and_emits_end_to_end() {
        let refresher = Refresher::new(
            StaticSource {
                prices: Some(PRICE_FEED),
                stations: Some(STATION_FEED),
            },
            Arc::new(RecordCache::new(Duration::from_secs(3600))),
            RecordingSink::default(),
        );

        let emitted = refresher.refresh_once().await.unwrap();
        assert_eq!(emitted, 1);

        let tuples = refresher.sink.0.lock().unwrap();
        let t = &tuples[0];
        assert_eq!(t.station_id, 101);
        assert_eq!(t.fuel_type, "benzina");
        assert_eq!(t.price, 1.899);
        assert!(t.self_service);
        assert_eq!(t.name, "Stazione Roma Nord");
        assert_eq!(t.station_type, "roadside");
        assert_eq!(t.municipality, "Roma");
        assert_eq!(t.province, "RM");
        assert_eq!(t.brand, "AGIP");
    }

    #[tokio::test]
    async fn station_fetch_failure_emits_nothing_but_keeps_the_cache() {
        let refresher = Refresher::new(
            StaticSource {
                prices: Some(PRICE_FEED),
                stations: None,
            },
            Arc::new(RecordCache::new(Duration::from_secs(3600))),
            RecordingSink::default(),
        );

        let err = refresher.refresh_once().await.unwrap_err();
        assert!(matches!(err, FeedError::Fetch(_)));
        assert!(refresher.sink.0.lock().unwrap().is_empty());

        let key = record(101).cache_key();
        let cached = refresher.cache.get(&key).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].price, 1.899);
    }

    #[tokio::test]
    async fn price_fetch_failure_touches_nothing() {
        let refresher = Refresher::new(
            StaticSource {
                prices: None,
                stations: Some(STATION_FEED),
            },
            Arc::new(RecordCache::new(Duration::from_secs(3600))),
            RecordingSink::default(),
        );

        assert!(refresher.refresh_once().await.is_err());
        assert!(refresher.sink.0.lock().unwrap().is_empty());
        assert!(refresher.cache.get(&record(101).cache_key()).is_none());
    }
}
