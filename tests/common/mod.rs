#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const HEADERS: [&str; 12] = [
    "fixed acidity",
    "volatile acidity",
    "citric acid",
    "residual sugar",
    "chlorides",
    "free sulfur dioxide",
    "total sulfur dioxide",
    "density",
    "pH",
    "sulphates",
    "alcohol",
    "quality",
];

/// Eleven plausible feature values for one wine
pub fn feature_row(i: usize) -> Vec<f64> {
    let wobble = |k: usize| ((i * 7 + k * 13) % 17) as f64 / 17.0;
    vec![
        7.0 + wobble(0),
        0.4 + 0.3 * wobble(1),
        0.1 + 0.2 * wobble(2),
        1.8 + wobble(3),
        0.07 + 0.01 * wobble(4),
        10.0 + 5.0 * wobble(5),
        30.0 + 10.0 * wobble(6),
        0.996 + 0.002 * wobble(7),
        3.2 + 0.3 * wobble(8),
        0.5 + 0.2 * wobble(9),
        9.0 + 0.5 * (i % 5) as f64 + 0.1 * wobble(10),
    ]
}

/// Semicolon-delimited source file with `rows` wines; quality tracks alcohol.
pub fn write_source(path: &Path, rows: usize, fractional_quality: bool) {
    let mut out = HEADERS.join(";");
    out.push('\n');
    for i in 0..rows {
        let mut cells: Vec<String> = feature_row(i).iter().map(|v| format!("{:.4}", v)).collect();
        let quality = 4 + i % 5;
        cells.push(if fractional_quality {
            format!("{}.5", quality)
        } else {
            quality.to_string()
        });
        out.push_str(&cells.join(";"));
        out.push('\n');
    }
    fs::write(path, out).unwrap();
}

/// Config directory whose artifacts and source live under `root`.
pub fn write_config(root: &Path, source: &Path, halt_on_failure: bool) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        format!(
            r#"artifacts_root = {artifacts:?}

[data_ingestion]
source_url = {source:?}
source_delimiter = ";"

[data_validation]
halt_on_failure = {halt_on_failure}

[model_evaluation]
mlflow_uri = ""
"#,
            artifacts = root.join("artifacts").display().to_string(),
            source = source.display().to_string(),
        ),
    )
    .unwrap();
    fs::write(
        config_dir.join("params.toml"),
        "[elastic_net]\nalpha = 0.01\nl1_ratio = 0.1\nmax_iter = 5000\n\n[split]\ntest_size = 0.25\nrandom_state = 42\n",
    )
    .unwrap();

    let mut schema = String::from("[columns]\n");
    for name in &HEADERS[..11] {
        schema.push_str(&format!("{:?} = \"float64\"\n", name));
    }
    schema.push_str("quality = \"int64\"\n\n[target_column]\nname = \"quality\"\n");
    fs::write(config_dir.join("schema.toml"), schema).unwrap();
    config_dir
}
