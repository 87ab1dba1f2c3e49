//! Fixture artifacts for end-to-end tests.
//!
//! The model is a minimal ONNX graph written as raw protobuf:
//! `prediction = ReduceMean(image + auxiliary)` over `[1, n]` float inputs.
//! With a bundle whose mean equals its scaler centre the auxiliary vector is
//! all zeros, so the score is the mean image intensity.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};

const ONNX_FLOAT: u64 = 1;

fn put_varint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

fn put_varint_field(buf: &mut Vec<u8>, field: u64, v: u64) {
    put_varint(buf, field << 3);
    put_varint(buf, v);
}

fn put_bytes_field(buf: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    put_varint(buf, (field << 3) | 2);
    put_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn value_info(name: &str, dims: &[u64]) -> Vec<u8> {
    let mut shape = Vec::new();
    for &d in dims {
        let mut dim = Vec::new();
        put_varint_field(&mut dim, 1, d);
        put_bytes_field(&mut shape, 1, &dim);
    }
    let mut tensor = Vec::new();
    put_varint_field(&mut tensor, 1, ONNX_FLOAT);
    put_bytes_field(&mut tensor, 2, &shape);
    let mut ty = Vec::new();
    put_bytes_field(&mut ty, 1, &tensor);

    let mut info = Vec::new();
    put_bytes_field(&mut info, 1, name.as_bytes());
    put_bytes_field(&mut info, 2, &ty);
    info
}

fn node(op: &str, inputs: &[&str], output: &str) -> Vec<u8> {
    let mut node = Vec::new();
    for input in inputs {
        put_bytes_field(&mut node, 1, input.as_bytes());
    }
    put_bytes_field(&mut node, 2, output.as_bytes());
    put_bytes_field(&mut node, 3, format!("{op}_0").as_bytes());
    put_bytes_field(&mut node, 4, op.as_bytes());
    node
}

/// Serialized ONNX model taking two `[1, feature_len]` inputs.
pub fn mean_model(feature_len: u64) -> Vec<u8> {
    let mut graph = Vec::new();
    put_bytes_field(&mut graph, 1, &node("Add", &["image", "auxiliary"], "sum"));
    put_bytes_field(&mut graph, 1, &node("ReduceMean", &["sum"], "prediction"));
    put_bytes_field(&mut graph, 2, b"dfu_fixture");
    put_bytes_field(&mut graph, 11, &value_info("image", &[1, feature_len]));
    put_bytes_field(&mut graph, 11, &value_info("auxiliary", &[1, feature_len]));
    put_bytes_field(&mut graph, 12, &value_info("prediction", &[1, 1]));

    let mut opset = Vec::new();
    put_varint_field(&mut opset, 2, 13);

    let mut model = Vec::new();
    put_varint_field(&mut model, 1, 7);
    put_bytes_field(&mut model, 2, b"dfu-fixture");
    put_bytes_field(&mut model, 7, &graph);
    put_bytes_field(&mut model, 8, &opset);
    model
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub model: PathBuf,
    pub bundle: PathBuf,
}

impl Fixture {
    /// Model with 4096-wide inputs and a bundle producing a zero auxiliary
    /// vector.
    pub fn new() -> Self {
        Self::with_feature_len(4096)
    }

    pub fn with_feature_len(feature_len: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("dfu_model.onnx");
        let bundle = dir.path().join("preprocessing.json");
        fs::write(&model, mean_model(feature_len)).unwrap();
        fs::write(
            &bundle,
            r#"{"mean": 26.0, "scaler": {"center": 26.0, "scale": 0.5}, "samples": 1000}"#,
        )
        .unwrap();
        Self { dir, model, bundle }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a uniform grayscale PNG and return its path.
    pub fn gray_image(&self, name: &str, width: u32, height: u32, level: u8) -> PathBuf {
        let path = self.path(name);
        write_gray(&path, width, height, level);
        path
    }
}

pub fn write_gray(path: &Path, width: u32, height: u32, level: u8) {
    GrayImage::from_pixel(width, height, Luma([level]))
        .save(path)
        .unwrap();
}
