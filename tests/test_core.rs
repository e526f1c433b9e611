use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use ndarray::{ArrayD, ArrayView4, IxDyn};
use tempfile::TempDir;

use imagesearch::{
    chi_squared_distance, cosine_distance, AppError, DiskLoader, FeatureExtractor, FeatureModel,
    HistogramExtractor, ImageLoader, RankedResult, Result, SearchConfig, SearchMethod,
    SimilaritySearch,
};

/// Deterministic stand-in for a CNN: per-channel means plus a brightness term
struct StubModel;

impl FeatureModel for StubModel {
    fn input_size(&self) -> (u32, u32) {
        (8, 8)
    }

    fn infer(&self, input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>> {
        let mut features: Vec<f32> = (0..3)
            .map(|c| input.slice(ndarray::s![0, c, .., ..]).mean().unwrap_or(0.0))
            .collect();
        features.push(features.iter().sum::<f32>() / 3.0);
        Ok(ArrayD::from_shape_vec(IxDyn(&[1, 4]), features)?)
    }
}

/// Writes a 16x16 two-tone PNG: `a` on the left half, `b` on the right.
fn write_png(dir: &Path, name: &str, a: [u8; 3], b: [u8; 3]) -> PathBuf {
    let mut img = RgbImage::new(16, 16);
    for (x, _, px) in img.enumerate_pixels_mut() {
        *px = if x < 8 { Rgb(a) } else { Rgb(b) };
    }
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

struct Collection {
    _dir: TempDir,
    query: PathBuf,
    images: Vec<PathBuf>,
}

fn collection() -> Collection {
    let dir = tempfile::tempdir().unwrap();
    let d = dir.path();
    let images = vec![
        write_png(d, "a_query.png", [250, 10, 10], [10, 10, 250]),
        write_png(d, "b_twin.png", [250, 10, 10], [10, 10, 250]),
        write_png(d, "c_close.png", [250, 10, 10], [10, 250, 10]),
        write_png(d, "d_far.png", [10, 250, 10], [120, 120, 120]),
        write_png(d, "e_dark.png", [0, 0, 0], [5, 5, 5]),
    ];
    Collection {
        query: images[0].clone(),
        images,
        _dir: dir,
    }
}

fn search(method: SearchMethod) -> SimilaritySearch {
    let config = SearchConfig {
        method,
        bins: 32,
        k: 5,
        parallel: true,
    };
    SimilaritySearch::new(config).with_model(StubModel)
}

fn assert_well_formed(result: &RankedResult, query: &Path, expected_len: usize) {
    assert_eq!(result.len(), expected_len);
    assert_eq!(result.query().image, query);
    assert_eq!(result.query().distance, 0.0);

    let distances: Vec<f64> = result.neighbours().iter().map(|e| e.distance).collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]), "{:?}", distances);
    assert!(distances.iter().all(|&d| d >= 0.0));

    let mut seen: Vec<&Path> = result.iter().map(|e| e.image.as_path()).collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), result.len());
}

#[test]
fn test_histogram_search_shape_and_order() {
    let c = collection();
    for k in [0, 1, 3, 4, 10] {
        let result = search(SearchMethod::Histogram)
            .search_k(&c.query, &c.images, k)
            .unwrap();
        assert_well_formed(&result, &c.query, k.min(4) + 1);
    }

    let result = search(SearchMethod::Histogram).search(&c.query, &c.images).unwrap();
    assert!(result.neighbours()[0].image.ends_with("b_twin.png"));
    assert_eq!(result.neighbours()[0].distance, 0.0);
    assert!(result.neighbours()[1].image.ends_with("c_close.png"));
}

#[test]
fn test_embedding_search_shape_and_order() {
    let c = collection();
    for k in [0, 2, 4, 10] {
        let result = search(SearchMethod::Embedding)
            .search_k(&c.query, &c.images, k)
            .unwrap();
        assert_well_formed(&result, &c.query, k.min(4) + 1);
    }

    let result = search(SearchMethod::Embedding).search(&c.query, &c.images).unwrap();
    assert!(result.neighbours()[0].image.ends_with("b_twin.png"));
    assert_eq!(result.neighbours()[0].distance, 0.0);
    assert!(result.iter().all(|e| e.distance <= 2.0));
}

#[test]
fn test_single_candidate_with_large_k() {
    let dir = tempfile::tempdir().unwrap();
    let query = write_png(dir.path(), "q.png", [1, 2, 3], [4, 5, 6]);
    let other = write_png(dir.path(), "o.png", [9, 9, 9], [200, 200, 200]);
    let candidates = vec![query.clone(), other];

    for method in [SearchMethod::Histogram, SearchMethod::Embedding] {
        let result = search(method).search_k(&query, &candidates, 5).unwrap();
        assert_well_formed(&result, &query, 2);
    }
}

#[test]
fn test_k_exceeds_candidates() {
    let c = collection();
    let three: Vec<PathBuf> = c.images[1..4].to_vec();

    for method in [SearchMethod::Histogram, SearchMethod::Embedding] {
        let result = search(method).search_k(&c.query, &three, 10).unwrap();
        assert_well_formed(&result, &c.query, 4);
    }
}

#[test]
fn test_empty_candidate_set() {
    let c = collection();
    for method in [SearchMethod::Histogram, SearchMethod::Embedding] {
        let result = search(method).search_k(&c.query, &[], 5).unwrap();
        assert_well_formed(&result, &c.query, 1);
    }
}

#[test]
fn test_caller_candidates_untouched() {
    let c = collection();
    let before = c.images.clone();
    search(SearchMethod::Histogram).search(&c.query, &c.images).unwrap();
    assert_eq!(c.images, before);
}

#[test]
fn test_identical_pixels_zero_distance() {
    let c = collection();
    let query = DiskLoader.load(&c.images[0]).unwrap();
    let twin = DiskLoader.load(&c.images[1]).unwrap();

    let extractor = HistogramExtractor::default();
    let (hq, ht) = (extractor.extract(&query), extractor.extract(&twin));
    assert_eq!(chi_squared_distance(&hq, &ht).unwrap(), 0.0);
    assert_eq!(chi_squared_distance(&ht, &hq).unwrap(), 0.0);

    let features = FeatureExtractor::new(&StubModel);
    let (eq, et) = (features.extract(&query).unwrap(), features.extract(&twin).unwrap());
    assert_eq!(cosine_distance(eq.view(), et.view()), 0.0);
}

#[test]
fn test_histogram_values_in_unit_range() {
    let c = collection();
    let extractor = HistogramExtractor::new(32).unwrap();
    for path in &c.images {
        let hist = extractor.extract(&DiskLoader.load(path).unwrap());
        assert_eq!(hist.max(), 1.0);
        assert!(hist.nonzero().iter().all(|&(_, v)| v > 0.0 && v <= 1.0));
    }
}

#[test]
fn test_unknown_method_rejected() {
    let err = "color-moments".parse::<SearchMethod>().unwrap_err();
    assert!(matches!(err, AppError::InvalidConfiguration(_)));
    assert!(err.to_string().contains("histogram, embedding"));
}

#[test]
fn test_corrupt_candidate_aborts_search() {
    let c = collection();
    let broken = c.query.with_file_name("broken.png");
    std::fs::write(&broken, b"definitely not a png").unwrap();

    let mut candidates = c.images.clone();
    candidates.push(broken.clone());

    for method in [SearchMethod::Histogram, SearchMethod::Embedding] {
        match search(method).search(&c.query, &candidates) {
            Err(AppError::Decode { path, .. }) => assert_eq!(path, broken),
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}

#[test]
fn test_csv_export() {
    let c = collection();
    let result = search(SearchMethod::Histogram)
        .search_k(&c.query, &c.images, 2)
        .unwrap();

    let out = tempfile::tempdir().unwrap();
    let csv = out.path().join("2_most_similar_a_query.csv");
    result.save_csv(&csv).unwrap();

    let text = std::fs::read_to_string(&csv).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "image,distance");
    assert!(lines[1].ends_with("a_query.png,0"));
}
