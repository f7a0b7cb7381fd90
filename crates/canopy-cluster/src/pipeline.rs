use canopy_core::error::Result;
use canopy_core::models::{AlertQuery, ClusterSummary, ClusteredRecord, PublishMode, PublishReport};
use canopy_core::ports::{AlertSource, SheetBackend};
use canopy_geo::{
    enrich, join_centroids, to_planar, AreaOfInterest, GeoBackend, GeometryBackend, Projector,
    ReferenceLayer,
};
use canopy_publish::Publisher;
use serde::Serialize;

use crate::area::{aggregate, attach, centroids};
use crate::engine::{ClusterEngine, ClusterOptions, ClusterStats};

/// Run-level settings besides the collaborators themselves
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub cluster: ClusterOptions,
    pub publish_mode: PublishMode,
    pub dedup: bool,
}

/// What one pipeline run did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Alerts returned by the source
    pub fetched: usize,

    /// Alerts left after clipping to the AOI
    pub in_aoi: usize,

    pub stats: ClusterStats,

    /// Non-fatal geometry warnings, rendered
    pub warnings: Vec<String>,

    pub summaries: Vec<ClusterSummary>,

    pub rows: Vec<ClusteredRecord>,

    /// `None` when there was nothing to publish
    pub publish: Option<PublishReport>,
}

impl RunReport {
    fn empty(fetched: usize) -> Self {
        Self {
            fetched,
            in_aoi: 0,
            stats: ClusterStats::default(),
            warnings: Vec::new(),
            summaries: Vec::new(),
            rows: Vec::new(),
            publish: None,
        }
    }

    pub fn total_area_m2(&self) -> f64 {
        self.summaries.iter().map(|s| s.area_m2).sum()
    }
}

/// Fetch, enrich, cluster and publish one batch of alerts
pub struct AlertPipeline<S, B, P, G = GeoBackend>
where
    S: AlertSource,
    B: SheetBackend,
    P: Projector,
    G: GeometryBackend,
{
    source: S,
    publisher: Publisher<B>,
    projector: P,
    layers: Vec<ReferenceLayer>,
    engine: ClusterEngine<G>,
    options: PipelineOptions,
}

impl<S, B, P> AlertPipeline<S, B, P>
where
    S: AlertSource,
    B: SheetBackend,
    P: Projector,
{
    pub fn new(
        source: S,
        publisher: Publisher<B>,
        projector: P,
        layers: Vec<ReferenceLayer>,
        options: PipelineOptions,
    ) -> Self {
        let engine = ClusterEngine::new(options.cluster.clone());
        Self { source, publisher, projector, layers, engine, options }
    }
}

impl<S, B, P, G> AlertPipeline<S, B, P, G>
where
    S: AlertSource,
    B: SheetBackend,
    P: Projector,
    G: GeometryBackend,
{
    /// Pipeline around a prepared engine; its options replace `options.cluster`
    pub fn with_engine(
        source: S,
        publisher: Publisher<B>,
        projector: P,
        layers: Vec<ReferenceLayer>,
        engine: ClusterEngine<G>,
        mut options: PipelineOptions,
    ) -> Self {
        options.cluster = engine.options().clone();
        Self { source, publisher, projector, layers, engine, options }
    }

    pub fn publisher(&self) -> &Publisher<B> {
        &self.publisher
    }

    /// Execute one run.
    ///
    /// Stages: fetch, clip to the AOI, enrich from reference layers, project,
    /// cluster, measure, join cluster centroids back onto the layers, publish.
    /// An empty batch after clipping skips publishing.
    pub async fn execute(&self, query: &AlertQuery) -> Result<RunReport> {
        // Phase 1: Fetch and clip
        let records = self.source.fetch(query).await?;
        let fetched = records.len();

        let aoi = AreaOfInterest::from_ring(&query.aoi)?;
        let mut records = aoi.clip(records);
        if records.is_empty() {
            tracing::info!(fetched, "No alerts inside the AOI, nothing to publish");
            return Ok(RunReport::empty(fetched));
        }
        let in_aoi = records.len();

        // Phase 2: Attribute enrichment
        enrich(&mut records, &self.layers);

        // Phase 3: Clustering and area
        let planar = to_planar(&records, &self.projector)?;
        let clustering = self.engine.cluster(&planar, &records)?;
        let mut summaries = aggregate(&clustering, self.engine.backend());
        centroids(&mut summaries, &self.projector)?;

        for layer in &self.layers {
            join_centroids(&mut records, &clustering.labels, &summaries, layer);
        }

        let rows = attach(&records, &clustering, &summaries);

        // Phase 4: Publish
        let report =
            self.publisher.publish(&rows, self.options.publish_mode, self.options.dedup).await?;
        self.publisher.log_run(&report, report.published_at).await?;

        tracing::info!(
            fetched,
            in_aoi,
            clusters = summaries.len(),
            crs = %self.projector.planar_crs().authority_code(),
            rows_written = report.rows_written,
            "Run complete"
        );

        Ok(RunReport {
            fetched,
            in_aoi,
            stats: clustering.stats,
            warnings: clustering.warnings.iter().map(|w| w.to_string()).collect(),
            summaries,
            rows,
            publish: Some(report),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use canopy_core::error::CanopyError;
    use canopy_core::models::{AlertRecord, ClusterId, Crs, FootprintShape};
    use canopy_geo::{FootprintIndex, ReferenceFeature, ReferenceLayer};
    use canopy_publish::MemorySheets;
    use chrono::NaiveDate;
    use geo::{Coord, MultiPolygon, Polygon, Rect};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSource {
        records: Vec<AlertRecord>,
    }

    #[async_trait]
    impl AlertSource for StubSource {
        async fn fetch(&self, _query: &AlertQuery) -> Result<Vec<AlertRecord>> {
            Ok(self.records.clone())
        }

        fn dataset(&self) -> &str {
            "stub"
        }
    }

    struct FailingSource;

    #[async_trait]
    impl AlertSource for FailingSource {
        async fn fetch(&self, _query: &AlertQuery) -> Result<Vec<AlertRecord>> {
            Err(CanopyError::Source { reason: "503".to_string() })
        }

        fn dataset(&self) -> &str {
            "failing"
        }
    }

    /// 1e-5 degrees per meter
    struct MeterGrid {
        crs: Crs,
    }

    impl Projector for MeterGrid {
        fn planar_crs(&self) -> &Crs {
            &self.crs
        }

        fn forward(&self, longitude: f64, latitude: f64) -> Result<Coord<f64>> {
            Ok(Coord { x: longitude * 100_000.0, y: latitude * 100_000.0 })
        }

        fn inverse(&self, planar: Coord<f64>) -> Result<Coord<f64>> {
            Ok(Coord { x: planar.x / 100_000.0, y: planar.y / 100_000.0 })
        }
    }

    fn query() -> AlertQuery {
        AlertQuery {
            aoi: vec![[110.0, 0.5], [110.5, 0.5], [110.5, 1.0], [110.0, 1.0], [110.0, 0.5]],
            start: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
        }
    }

    fn pipeline<S: AlertSource>(source: S, layers: Vec<ReferenceLayer>) -> AlertPipeline<S, MemorySheets, MeterGrid> {
        AlertPipeline::new(
            source,
            Publisher::new(MemorySheets::new(), "alerts", "log"),
            MeterGrid { crs: Crs::utm(49, true) },
            layers,
            PipelineOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_full_run() {
        let source = StubSource {
            records: vec![
                AlertRecord::new(110.20000, 0.70000),
                AlertRecord::new(110.20010, 0.70000),
                AlertRecord::new(110.30000, 0.80000),
                AlertRecord::new(110.30005, 0.80000),
                // Outside the AOI
                AlertRecord::new(111.00000, 0.80000),
            ],
        };
        let pipeline = pipeline(source, vec![]);

        let report = pipeline.execute(&query()).await.unwrap();

        assert_eq!(report.fetched, 5);
        assert_eq!(report.in_aoi, 4);
        assert_eq!(report.summaries.len(), 2);
        assert!(report.summaries.iter().all(|s| s.point_count() == 2));
        assert_eq!(report.rows[3].cluster_id, ClusterId::Sequence(2));

        let sheet = pipeline.publisher().backend().rows("alerts");
        assert_eq!(sheet.len(), 5);
        assert_eq!(pipeline.publisher().backend().rows("log").len(), 1);
    }

    #[tokio::test]
    async fn test_empty_run_skips_publish() {
        let pipeline = pipeline(StubSource { records: vec![] }, vec![]);

        let report = pipeline.execute(&query()).await.unwrap();

        assert!(report.publish.is_none());
        assert!(report.summaries.is_empty());
        assert!(pipeline.publisher().backend().rows("alerts").is_empty());
        assert!(pipeline.publisher().backend().rows("log").is_empty());
    }

    #[tokio::test]
    async fn test_enrichment_and_centroid_join() {
        let layer = ReferenceLayer::new(
            "district",
            "NAME_3",
            vec![ReferenceFeature {
                value: Value::from("Sanggau"),
                geometry: MultiPolygon::new(vec![Rect::new((110.1, 0.6), (110.25, 0.75)).to_polygon()]),
            }],
        );
        let source = StubSource {
            records: vec![AlertRecord::new(110.2, 0.7), AlertRecord::new(110.4, 0.9)],
        };
        let pipeline = pipeline(source, vec![layer]);

        let report = pipeline.execute(&query()).await.unwrap();

        let first = &report.rows[0].record.attributes;
        assert_eq!(first["district"], Value::from("Sanggau"));
        assert_eq!(first["cluster_district"], Value::from("Sanggau"));
        assert_eq!(report.rows[1].record.attributes["district"], Value::Null);
    }

    /// Delegates to `GeoBackend` but never reports contact
    #[derive(Default)]
    struct Isolating {
        checks: AtomicUsize,
    }

    impl GeometryBackend for Isolating {
        type Index = FootprintIndex;

        fn buffer(&self, center: Coord<f64>, shape: &FootprintShape) -> Polygon<f64> {
            GeoBackend.buffer(center, shape)
        }

        fn build_index<'a>(
            &self,
            footprints: impl IntoIterator<Item = (usize, &'a Polygon<f64>)>,
        ) -> Self::Index {
            GeoBackend.build_index(footprints)
        }

        fn intersects(&self, _a: &Polygon<f64>, _b: &Polygon<f64>) -> bool {
            self.checks.fetch_add(1, Ordering::Relaxed);
            false
        }

        fn union_polygons(&self, polygons: &[Polygon<f64>]) -> MultiPolygon<f64> {
            GeoBackend.union_polygons(polygons)
        }

        fn area(&self, geometry: &MultiPolygon<f64>) -> f64 {
            GeoBackend.area(geometry)
        }

        fn centroid(&self, geometry: &MultiPolygon<f64>) -> Option<Coord<f64>> {
            GeoBackend.centroid(geometry)
        }
    }

    #[tokio::test]
    async fn test_custom_geometry_backend_is_used() {
        let source = StubSource {
            records: vec![AlertRecord::new(110.20000, 0.70000), AlertRecord::new(110.20005, 0.70000)],
        };
        let engine = ClusterEngine::with_backend(ClusterOptions::default(), Isolating::default());
        let pipeline = AlertPipeline::with_engine(
            source,
            Publisher::new(MemorySheets::new(), "alerts", "log"),
            MeterGrid { crs: Crs::utm(49, true) },
            vec![],
            engine,
            PipelineOptions::default(),
        );

        let report = pipeline.execute(&query()).await.unwrap();

        // Same input merges under the default backend
        assert_eq!(report.summaries.len(), 2);
        assert!(report.summaries.iter().all(|s| s.area_m2 == 125.44));
        assert_eq!(pipeline.engine.backend().checks.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let pipeline = pipeline(FailingSource, vec![]);
        let err = pipeline.execute(&query()).await.unwrap_err();
        assert!(matches!(err, CanopyError::Source { .. }));
    }
}
