use approx::{assert_abs_diff_eq, assert_relative_eq};
use housefit::clean::{CleaningConfig, clean_training_set};
use housefit::config::PipelineConfig;
use housefit::data::{DataError, load_housing_data};
use housefit::design::{ModelSpec, NeighborhoodEncoding};
use housefit::estimate::fit_ols;
use housefit::evaluate::RegressionMetrics;
use housefit::features::engineer_features;
use housefit::model::TrainedModel;
use housefit::pipeline::{PipelineError, model_file_name, run_analysis, run_prediction};
use housefit::report::{METRICS_FILE, REPORT_FILE};
use housefit::split::train_test_split;
use housefit::synthetic::{GeneratingCoefficients, SyntheticHousingBuilder, write_csv};
use ndarray::Array1;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_synthetic(dir: &Path, rows: usize, seed: u64) -> std::path::PathBuf {
    let path = dir.join("train.csv");
    let data = SyntheticHousingBuilder::new(rows)
        .seed(seed)
        .outliers(5)
        .build_raw();
    write_csv(&data, &path).unwrap();
    path
}

fn read_tsv(path: &Path) -> Vec<csv::StringRecord> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .unwrap()
        .records()
        .map(|r| r.unwrap())
        .collect()
}

#[test]
fn end_to_end_analysis_produces_every_artifact() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    let config = PipelineConfig {
        data_path: write_synthetic(dir.path(), 500, 3),
        output_dir: out.clone(),
        ..PipelineConfig::default()
    };
    let summary = run_analysis(&config).unwrap();

    assert!(out.join(REPORT_FILE).exists());
    assert!(out.join(METRICS_FILE).exists());
    for spec in ModelSpec::ALL {
        assert!(out.join(model_file_name(spec)).exists());
        assert!(out.join(format!("predictions_{}.tsv", spec.label())).exists());
        assert!(out.join(format!("residuals_{}.tsv", spec.label())).exists());
    }
    for path in &summary.artifacts.plot_data {
        assert!(path.exists(), "missing {}", path.display());
    }

    let report = fs::read_to_string(out.join(REPORT_FILE)).unwrap();
    assert!(report.contains("LogPrice ~ OverallQual + GrLivArea + GarageCars + Neighborhood"));
    assert!(report.contains("BathComposite"));
    assert!(report.contains("RMSE"));

    let metrics = read_tsv(&out.join(METRICS_FILE));
    assert_eq!(metrics.len(), 2);
    assert_eq!(&metrics[0][0], "base");
    assert_eq!(&metrics[1][0], "extended");

    // The generating process favours the extended predictor set.
    let extended = &summary.outcomes[1].evaluation.metrics;
    assert!(extended.r_squared > 0.5, "R² = {}", extended.r_squared);
}

#[test]
fn metrics_can_be_recomputed_from_the_written_predictions() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    let config = PipelineConfig {
        data_path: write_synthetic(dir.path(), 400, 5),
        output_dir: out.clone(),
        ..PipelineConfig::default()
    };
    let summary = run_analysis(&config).unwrap();

    for outcome in &summary.outcomes {
        let rows = read_tsv(&out.join(format!("predictions_{}.tsv", outcome.model.spec.label())));
        assert_eq!(rows.len(), summary.test_rows);

        let mut actual = Vec::new();
        let mut predicted = Vec::new();
        for row in &rows {
            let log_p: f64 = row[1].parse().unwrap();
            let price: f64 = row[2].parse().unwrap();
            assert_relative_eq!(log_p.exp(), price, max_relative = 1e-6);
            predicted.push(price);
            actual.push(row[3].parse::<f64>().unwrap());
        }
        let recomputed = RegressionMetrics::compute(&actual, &predicted).unwrap();
        let reported = &outcome.evaluation.metrics;
        assert_relative_eq!(recomputed.rmse, reported.rmse, max_relative = 1e-4);
        assert_relative_eq!(recomputed.mae, reported.mae, max_relative = 1e-4);
        assert_abs_diff_eq!(recomputed.r_squared, reported.r_squared, epsilon = 1e-4);
    }
}

#[test]
fn split_is_reproducible_and_partitions_the_rows() {
    let a = train_test_split(1460, 0.7, 42).unwrap();
    let b = train_test_split(1460, 0.7, 42).unwrap();
    assert_eq!(a, b);
    // 0.7 * 1460 is 1021.999... in floating point; the training set still gets 1022.
    assert_eq!(a.train.len(), 1022);
    assert_eq!(a.test.len(), 438);

    let train: HashSet<usize> = a.train.iter().copied().collect();
    let test: HashSet<usize> = a.test.iter().copied().collect();
    assert!(train.is_disjoint(&test));
    assert_eq!(train.union(&test).count(), 1460);

    let other = train_test_split(1460, 0.7, 43).unwrap();
    assert_ne!(a.train, other.train);
}

#[test]
fn cleaned_training_set_has_no_outliers_or_gaps() {
    let dir = tempdir().unwrap();
    let path = write_synthetic(dir.path(), 300, 8);
    let full = load_housing_data(&path, "LotFrontage").unwrap();
    assert!(full.impute.missing_count() > 0);

    let partition = train_test_split(full.n_rows(), 0.7, 42).unwrap();
    let train = full.subset(&partition.train);
    let (cleaned, report) = clean_training_set(&train, &CleaningConfig::default()).unwrap();

    assert!(cleaned.gr_liv_area.iter().all(|&a| a < 4000.0));
    assert_eq!(cleaned.impute.missing_count(), 0);
    assert_eq!(report.rows_before, train.n_rows());
    assert_eq!(report.rows_after + report.rows_removed, report.rows_before);
    let kept = train.retain_rows(|i| train.gr_liv_area[i] < 4000.0);
    assert_eq!(report.imputed_cells, kept.impute.missing_count());
}

#[test]
fn derived_columns_follow_their_definitions() {
    let mut data = SyntheticHousingBuilder::new(80).seed(21).build_raw();
    engineer_features(&mut data).unwrap();

    let log_price = data.log_price.as_ref().unwrap();
    let prices = data.sale_price.as_ref().unwrap();
    let composite = data.bath_composite.as_ref().unwrap();
    for i in 0..data.n_rows() {
        assert_relative_eq!(log_price[i].exp(), prices[i], max_relative = 1e-12);
        assert_eq!(composite[i], data.full_bath[i] + 0.5 * data.half_bath[i]);
    }
}

#[test]
fn noiseless_fit_predicts_a_known_house() {
    let truth = GeneratingCoefficients::default();
    let train = SyntheticHousingBuilder::new(400)
        .seed(17)
        .noise_sd(0.0)
        .coefficients(truth.clone())
        .build();
    let model = fit_ols(&train, ModelSpec::Extended).unwrap();

    let reference = model.encoding.reference_level().to_string();
    let effect =
        |level: &str| truth.neighborhood_effects[level] - truth.neighborhood_effects[&reference];

    // One house: OverallQual 7, 1800 sq ft, two-car garage, 2 full and 1 half bath, NAmes.
    let mut house = train.subset(&[0]);
    house.overall_qual = Array1::from_vec(vec![7.0]);
    house.gr_liv_area = Array1::from_vec(vec![1800.0]);
    house.garage_cars = Array1::from_vec(vec![2.0]);
    house.full_bath = Array1::from_vec(vec![2.0]);
    house.half_bath = Array1::from_vec(vec![1.0]);
    house.neighborhood = vec!["NAmes".to_string()];
    house.sale_price = None;
    engineer_features(&mut house).unwrap();
    assert_eq!(house.bath_composite.as_ref().unwrap()[0], 2.5);

    let intercept = truth.intercept + truth.neighborhood_effects[&reference];
    let expected_eta = intercept
        + truth.overall_qual * 7.0
        + truth.gr_liv_area * 1800.0
        + truth.garage_cars * 2.0
        + truth.bath_composite * 2.5
        + effect("NAmes");
    let predicted = model.predict_price(&house).unwrap();
    assert_relative_eq!(predicted[0], expected_eta.exp(), max_relative = 1e-6);

    // The same house through the fitted coefficients by hand.
    let coef = |term: &str| model.coefficient(term).unwrap_or(0.0);
    let manual_eta = coef("(Intercept)")
        + coef("OverallQual") * 7.0
        + coef("GrLivArea") * 1800.0
        + coef("GarageCars") * 2.0
        + coef("BathComposite") * 2.5
        + coef("Neighborhood[NAmes]");
    assert_relative_eq!(predicted[0], manual_eta.exp(), max_relative = 1e-12);
}

#[test]
fn a_single_house_can_be_scored_from_a_saved_model() {
    let dir = tempdir().unwrap();
    let train = SyntheticHousingBuilder::new(300).seed(23).build();
    let model = fit_ols(&train, ModelSpec::Extended).unwrap();
    let model_path = dir.path().join(model_file_name(ModelSpec::Extended));
    model.save(&model_path).unwrap();

    let house_path = dir.path().join("house.csv");
    fs::write(
        &house_path,
        "Id,LotFrontage,Neighborhood,OverallQual,GrLivArea,FullBath,HalfBath,GarageCars\n\
         2001,NA,NAmes,7,1800,2,1,2\n",
    )
    .unwrap();
    let output = dir.path().join("predictions.tsv");
    let count = run_prediction(&model_path, &house_path, "LotFrontage", &output).unwrap();
    assert_eq!(count, 1);

    let rows = read_tsv(&output);
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], "2001");

    let coef = |term: &str| model.coefficient(term).unwrap_or(0.0);
    let eta = coef("(Intercept)")
        + coef("OverallQual") * 7.0
        + coef("GrLivArea") * 1800.0
        + coef("GarageCars") * 2.0
        + coef("BathComposite") * 2.5
        + coef("Neighborhood[NAmes]");
    let log_p: f64 = rows[0][1].parse().unwrap();
    let price: f64 = rows[0][2].parse().unwrap();
    assert_abs_diff_eq!(log_p, eta, epsilon = 1e-6);
    assert_relative_eq!(price, eta.exp(), max_relative = 1e-6);
}

#[test]
fn reference_level_is_first_in_natural_order() {
    let levels: Vec<String> = ["Sawyer", "blmngtn", "NAmes", "CollgCr", "NAmes"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let encoding = NeighborhoodEncoding::from_levels(&levels).unwrap();
    assert_eq!(encoding.reference_level(), "blmngtn");
    assert_eq!(encoding.indicator_levels(), ["CollgCr", "NAmes", "Sawyer"]);
}

#[test]
fn saved_models_reload_identically() {
    let dir = tempdir().unwrap();
    let train = SyntheticHousingBuilder::new(150).seed(2).build();
    let model = fit_ols(&train, ModelSpec::Base).unwrap();
    let path = dir.path().join(model_file_name(ModelSpec::Base));
    model.save(&path).unwrap();

    let reloaded = TrainedModel::load(&path).unwrap();
    assert_eq!(reloaded.spec, ModelSpec::Base);
    assert_eq!(reloaded.encoding, model.encoding);
    let a = model.predict_log(&train).unwrap();
    let b = reloaded.predict_log(&train).unwrap();
    for (x, y) in a.iter().zip(b.iter()) {
        assert_relative_eq!(*x, *y, max_relative = 1e-12);
    }
}

#[test]
fn missing_input_file_is_fatal() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        data_path: dir.path().join("nope.csv"),
        output_dir: dir.path().join("out"),
        ..PipelineConfig::default()
    };
    match run_analysis(&config) {
        Err(PipelineError::Data(DataError::FileNotFound(path))) => {
            assert!(path.contains("nope.csv"));
        }
        other => panic!("expected FileNotFound, got {other:?}"),
    }
}
