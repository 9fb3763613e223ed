//! Result aggregation: turn one page's raw detections into ordered items.
//!
//! ## Reading order
//!
//! Text and table detections are ranked independently by the top edge of
//! their region, then by the left edge. Sorting is stable and uses a total
//! order on `f32`, so identical input always yields identical ranks. The
//! rank becomes the item's `order`.
//!
//! ## Artifacts
//!
//! Artifact names are scoped by the run's [`RunId`]. Tables are stored twice (HTML export and PNG rendering); figures once as
//! PNG. A store failure never drops an item: the table keeps an empty link,
//! the figure is left out of its page's image list, and the failure is
//! reported in [`PageResult::artifact_failures`].

use crate::error::ArtifactStoreError;
use crate::model::{Detection, ImageRegion, PageDetections, TableDetection, TextDetection};
use crate::output::{ArtifactFailure, ImageItem, PageResult, TableItem, TextItem};
use crate::pipeline::encode;
use crate::storage::{Artifact, ArtifactKey, ArtifactStore, RunId};
use futures::future::join_all;
use image::DynamicImage;
use tracing::{debug, warn};

/// Aggregate one page of run `run`. Consumes the detections.
pub async fn aggregate(
    detections: PageDetections,
    run: RunId,
    store: &dyn ArtifactStore,
) -> PageResult {
    let page_number = detections.page_number;
    let mut texts: Vec<TextDetection> = Vec::new();
    let mut tables: Vec<TableDetection> = Vec::new();
    let mut figures: Vec<ImageRegion> = Vec::new();

    for detection in detections.detections {
        match detection {
            Detection::Text(t) => texts.push(t),
            Detection::Table(t) => tables.push(t),
            Detection::Image(i) => figures.push(i),
        }
    }

    texts.sort_by(|a, b| a.region.reading_cmp(&b.region));
    tables.sort_by(|a, b| a.region.reading_cmp(&b.region));
    figures.sort_by(|a, b| a.region.reading_cmp(&b.region));

    let mut result = PageResult::new(page_number);

    result.text = texts
        .into_iter()
        .enumerate()
        .map(|(order, t)| TextItem {
            page_number,
            order,
            content: t.content,
        })
        .collect();

    let stored_tables = join_all(
        tables
            .into_iter()
            .enumerate()
            .map(|(order, t)| store_table(store, run, page_number, order, t)),
    )
    .await;
    for (item, failures) in stored_tables {
        result.table.push(item);
        result.artifact_failures.extend(failures);
    }

    if !figures.is_empty() {
        let stored_figures = join_all(figures.iter().enumerate().map(|(order, f)| {
            let key = ArtifactKey::image(run, page_number, order);
            put(store, key, png_artifact(&key, &f.image))
        }))
        .await;

        let mut images = Vec::with_capacity(stored_figures.len());
        for stored in stored_figures {
            match stored {
                Ok(link) => images.push(link),
                Err(failure) => result.artifact_failures.push(failure),
            }
        }
        result.image = Some(ImageItem {
            page_number,
            images,
        });
    }

    debug!(
        "Page {} aggregated: {} text, {} table, {} image item(s)",
        page_number,
        result.text.len(),
        result.table.len(),
        usize::from(result.image.is_some())
    );
    result
}

async fn store_table(
    store: &dyn ArtifactStore,
    run: RunId,
    page_number: usize,
    order: usize,
    table: TableDetection,
) -> (TableItem, Vec<ArtifactFailure>) {
    let content_key = ArtifactKey::table_content(run, page_number, order);
    let image_key = ArtifactKey::table_image(run, page_number, order);
    let rendering = png_artifact(&image_key, &table.rendering);

    let (content, image) = futures::join!(
        put(store, content_key, Ok(Artifact::html(table.html))),
        put(store, image_key, rendering),
    );

    let mut failures = Vec::new();
    let mut link = |stored: Result<String, ArtifactFailure>| match stored {
        Ok(link) => link,
        Err(failure) => {
            failures.push(failure);
            String::new()
        }
    };
    let item = TableItem {
        page_number,
        order,
        content_link: link(content),
        image_link: link(image),
    };
    (item, failures)
}

fn png_artifact(key: &ArtifactKey, image: &DynamicImage) -> Result<Artifact, ArtifactStoreError> {
    encode::encode_png(image)
        .map(Artifact::png)
        .map_err(|e| ArtifactStoreError::Encode {
            key: key.object_name(),
            detail: e.to_string(),
        })
}

/// Store one artifact, converting any failure into an [`ArtifactFailure`].
async fn put(
    store: &dyn ArtifactStore,
    key: ArtifactKey,
    artifact: Result<Artifact, ArtifactStoreError>,
) -> Result<String, ArtifactFailure> {
    let stored = match artifact {
        Ok(artifact) => store.put(&key, artifact).await,
        Err(e) => Err(e),
    };
    stored.map_err(|e| {
        warn!("Page {}: could not store {}: {}", key.page_number, key, e);
        ArtifactFailure {
            page_number: key.page_number,
            stream: key.kind.stream(),
            key: key.object_name(),
            detail: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Stream};
    use crate::storage::MemoryArtifactStore;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use uuid::Uuid;

    fn run() -> RunId {
        RunId::from(Uuid::from_u128(0x5eed))
    }

    fn link(file: &str) -> String {
        format!("memory://{}/{file}", run())
    }

    fn img() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])))
    }

    fn text(page: usize, top: f32, left: f32, content: &str) -> Detection {
        Detection::Text(TextDetection {
            page_number: page,
            region: BoundingBox::new(left, top, left + 50.0, top + 10.0),
            content: content.into(),
        })
    }

    fn table(page: usize, top: f32, html: &str) -> Detection {
        Detection::Table(TableDetection {
            page_number: page,
            region: BoundingBox::new(0.0, top, 100.0, top + 40.0),
            html: html.into(),
            rendering: img(),
        })
    }

    fn figure(page: usize, top: f32) -> Detection {
        Detection::Image(ImageRegion {
            page_number: page,
            region: BoundingBox::new(0.0, top, 20.0, top + 20.0),
            image: img(),
        })
    }

    fn page(n: usize, detections: Vec<Detection>) -> PageDetections {
        PageDetections {
            page_number: n,
            detections,
        }
    }

    /// Fails every artifact whose file name contains `needle`.
    struct FailingStore {
        inner: MemoryArtifactStore,
        needle: &'static str,
    }

    #[async_trait]
    impl ArtifactStore for FailingStore {
        async fn put(&self, key: &ArtifactKey, artifact: Artifact) -> Result<String, ArtifactStoreError> {
            if key.file_name().contains(self.needle) {
                return Err(ArtifactStoreError::S3 {
                    key: key.file_name(),
                    detail: "503 Slow Down".into(),
                });
            }
            self.inner.put(key, artifact).await
        }

        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn text_ordered_top_then_left() {
        let store = MemoryArtifactStore::new();
        let result = aggregate(
            page(
                0,
                vec![
                    text(0, 50.0, 0.0, "second"),
                    text(0, 10.0, 300.0, "first-right"),
                    text(0, 10.0, 0.0, "first-left"),
                ],
            ),
            run(),
            &store,
        )
        .await;

        let got: Vec<_> = result.text.iter().map(|t| (t.order, t.content.as_str())).collect();
        assert_eq!(got, vec![(0, "first-left"), (1, "first-right"), (2, "second")]);
    }

    #[tokio::test]
    async fn tables_store_html_and_png() {
        let store = MemoryArtifactStore::new();
        let result = aggregate(
            page(
                2,
                vec![table(2, 300.0, "<table>b</table>"), table(2, 100.0, "<table>a</table>")],
            ),
            run(),
            &store,
        )
        .await;

        assert_eq!(result.table.len(), 2);
        assert_eq!(result.table[0].content_link, link("page2_table0_content.html"));
        assert_eq!(result.table[0].image_link, link("page2_table0_image.png"));
        let html = store.get(&ArtifactKey::table_content(run(), 2, 0)).unwrap();
        assert_eq!(html.bytes, b"<table>a</table>");
        assert_eq!(html.content_type, "text/html");
        let png = store.get(&ArtifactKey::table_image(run(), 2, 1)).unwrap();
        assert_eq!(png.content_type, "image/png");
        assert!(result.artifact_failures.is_empty());
    }

    #[tokio::test]
    async fn figures_collected_into_one_item() {
        let store = MemoryArtifactStore::new();
        let result = aggregate(page(1, vec![figure(1, 80.0), figure(1, 5.0)]), run(), &store).await;

        let item = result.image.expect("image item");
        assert_eq!(item.page_number, 1);
        assert_eq!(item.images, vec![link("page1_image0.png"), link("page1_image1.png")]);
    }

    #[tokio::test]
    async fn page_without_figures_has_no_image_item() {
        let store = MemoryArtifactStore::new();
        let result = aggregate(page(0, vec![text(0, 1.0, 1.0, "x")]), run(), &store).await;
        assert!(result.image.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failed_table_image_keeps_item_with_empty_link() {
        let store = FailingStore {
            inner: MemoryArtifactStore::new(),
            needle: "_image.png",
        };
        let result = aggregate(page(0, vec![table(0, 10.0, "<table/>")]), run(), &store).await;

        assert_eq!(result.table.len(), 1);
        assert_eq!(result.table[0].content_link, link("page0_table0_content.html"));
        assert_eq!(result.table[0].image_link, "");
        assert_eq!(result.artifact_failures.len(), 1);
        assert_eq!(
            result.artifact_failures[0].key,
            format!("{}/page0_table0_image.png", run())
        );
        assert_eq!(result.artifact_failures[0].stream, Stream::Table);
    }

    #[tokio::test]
    async fn failed_figure_is_left_out() {
        let store = FailingStore {
            inner: MemoryArtifactStore::new(),
            needle: "page0_image0",
        };
        let result = aggregate(page(0, vec![figure(0, 10.0), figure(0, 90.0)]), run(), &store).await;

        let item = result.image.unwrap();
        assert_eq!(item.images, vec![link("page0_image1.png")]);
        assert_eq!(result.artifact_failures.len(), 1);
        assert_eq!(result.artifact_failures[0].stream, Stream::Image);
    }

    #[tokio::test]
    async fn aggregation_is_idempotent() {
        let detections = page(
            3,
            vec![
                text(3, 40.0, 0.0, "b"),
                table(3, 20.0, "<table/>"),
                text(3, 40.0, 0.0, "tie"),
                figure(3, 0.0),
                text(3, 5.0, 9.0, "a"),
            ],
        );

        let first = aggregate(detections.clone(), run(), &MemoryArtifactStore::new()).await;
        let second = aggregate(detections, run(), &MemoryArtifactStore::new()).await;
        assert_eq!(first, second);

        // Stable on ties: "b" was detected before "tie".
        assert_eq!(first.text[1].content, "b");
        assert_eq!(first.text[2].content, "tie");
    }
}
