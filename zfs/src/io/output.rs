//! Output formatting and logging utilities

use crate::zfs_impl::ZfsResult;
use byteorder::{LittleEndian, WriteBytesExt};
use color_eyre::eyre::{eyre, Result, WrapErr};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::SystemTime as StdSystemTime;
use tracing::info;
use tracing_subscriber::{
    fmt::format::Writer, fmt::layer, fmt::time::FormatTime, layer::SubscriberExt,
    util::SubscriberInitExt, Registry,
};

/// Custom time formatter that shows only seconds
struct SecondPrecisionTimer;

impl FormatTime for SecondPrecisionTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = StdSystemTime::now();
        let duration = now
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();

        let total_seconds = duration.as_secs();
        let hours = (total_seconds / 3600) % 24;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;

        write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Setup output logging to file or stdout
///
/// Log lines carry the `proc{rank=..}` span of the process that emitted them.
pub fn setup_output(output_path: Option<&String>) {
    match output_path {
        Some(path) => {
            if let Ok(log) = File::create(path) {
                let file_layer = layer()
                    .with_writer(log)
                    .with_timer(SecondPrecisionTimer)
                    .with_ansi(false);
                Registry::default().with(file_layer).init();
                info!("Output will be written to: {}", path);
            } else {
                eprintln!("Could not create output file: {}", path);
            }
        }
        None => {
            let stdout_layer = layer()
                .with_writer(std::io::stdout)
                .with_timer(SecondPrecisionTimer)
                .with_ansi(true);
            Registry::default().with(stdout_layer).init();
            info!("Output will be printed to stdout");
        }
    }
}

/// Write a C-ordered `f64` array in NumPy `.npy` format (version 1.0).
pub fn write_npy(path: &Path, array: &Array3<f64>) -> Result<()> {
    let shape = array.shape();
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}, {}), }}",
        shape[0], shape[1], shape[2]
    );
    // magic (6) + version (2) + header length (2) + header, padded to 64 bytes
    let unpadded = 10 + header.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let file = File::create(path)
        .wrap_err_with(|| format!("Unable to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    w.write_all(b"\x93NUMPY")?;
    w.write_all(&[1, 0])?;
    let header_len =
        u16::try_from(header.len()).map_err(|_| eyre!("npy header too long for version 1.0"))?;
    w.write_u16::<LittleEndian>(header_len)?;
    w.write_all(header.as_bytes())?;
    for &x in array.iter() {
        w.write_f64::<LittleEndian>(x)?;
    }
    w.flush()?;
    Ok(())
}

/// Summary of a calculation as written to `zfs.yml`. Energies in MHz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZfsReport {
    pub code: String,
    pub version: String,
    pub object: String,
    pub d_tensor: [[f64; 3]; 3],
    pub d: f64,
    pub e: f64,
    /// `[dy, dx, dz]`
    pub eigenvalues: [f64; 3],
    /// Eigenvectors as rows, in the order of `eigenvalues`
    pub eigenvectors: [[f64; 3]; 3],
    pub norbs: usize,
    pub nprocs: usize,
    pub memory: String,
}

impl ZfsReport {
    pub fn from_result(result: &ZfsResult) -> Self {
        let t = &result.tensor;
        let d_tensor = std::array::from_fn(|a| std::array::from_fn(|b| t.d[(a, b)]));
        let eigenvectors =
            std::array::from_fn(|k| std::array::from_fn(|a| t.eigenvectors[(a, k)]));
        ZfsReport {
            code: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            object: "zfs".to_string(),
            d_tensor,
            d: t.d_value,
            e: t.e_value,
            eigenvalues: t.eigenvalues,
            eigenvectors,
            norbs: result.norbs,
            nprocs: result.nprocs,
            memory: result.memory.to_string(),
        }
    }
}

pub fn write_report(path: &Path, report: &ZfsReport) -> Result<()> {
    let text = serde_yml::to_string(report).wrap_err("Failed to serialize ZFS report")?;
    fs::write(path, text).wrap_err_with(|| format!("Unable to write {}", path.display()))?;
    Ok(())
}

pub fn read_report(path: &Path) -> Result<ZfsReport> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Unable to read report: {}", path.display()))?;
    serde_yml::from_str(&text).wrap_err("Failed to parse ZFS report")
}

/// Compare D and E against a reference report.
///
/// Returns `(|dD|, |dE|)`. Both must be strictly below `tolerance` (MHz).
pub fn compare_reports(report: &ZfsReport, reference: &ZfsReport, tolerance: f64) -> Result<(f64, f64)> {
    let dd = (report.d - reference.d).abs();
    let de = (report.e - reference.e).abs();
    info!(
        "Reference D = {:.3} MHz, E = {:.3} MHz; deviation {:.3e} / {:.3e} MHz",
        reference.d, reference.e, dd, de
    );
    if !(dd < tolerance && de < tolerance) {
        return Err(eyre!(
            "D/E deviate from reference by {:.3e}/{:.3e} MHz (tolerance {:.1e})",
            dd,
            de,
            tolerance
        ));
    }
    Ok((dd, de))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = env::temp_dir().join(format!("zfs-output-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn report(d: f64, e: f64) -> ZfsReport {
        ZfsReport {
            code: "zfs".to_string(),
            version: "0.1.0".to_string(),
            object: "zfs".to_string(),
            d_tensor: [[1.0, 0.0, 0.0], [0.0, -2.0, 0.0], [0.0, 0.0, 1.0]],
            d,
            e,
            eigenvalues: [1.0, 1.0, -2.0],
            eigenvectors: [[1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]],
            norbs: 2,
            nprocs: 1,
            memory: "critical".to_string(),
        }
    }

    #[test]
    fn test_npy_layout() {
        let dir = scratch("npy");
        let path = dir.join("Iijab.npy");
        let array = Array3::from_shape_fn((2, 3, 6), |(i, j, k)| (i * 100 + j * 10 + k) as f64);
        write_npy(&path, &array).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..6], b"\x93NUMPY");
        assert_eq!(&bytes[6..8], &[1, 0]);
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.contains("'shape': (2, 3, 6)"));
        assert!(header.ends_with('\n'));

        let data = &bytes[10 + header_len..];
        assert_eq!(data.len(), 36 * 8);
        let at = |n: usize| f64::from_le_bytes(data[8 * n..8 * n + 8].try_into().unwrap());
        assert_eq!(at(0), 0.0);
        assert_eq!(at(1), 1.0);
        assert_eq!(at(6), 10.0);
        assert_eq!(at(35), 125.0);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_report_file_round_trip() {
        let dir = scratch("report");
        let path = dir.join("zfs.yml");
        let original = report(-3.5, 0.25);
        write_report(&path, &original).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("d: -3.5"));
        assert_eq!(read_report(&path).unwrap(), original);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_compare_reports() {
        let reference = report(100.0, 10.0);
        let (dd, de) = compare_reports(&report(100.0005, 10.0), &reference, 1e-3).unwrap();
        assert!(dd < 1e-3 && de == 0.0);
        assert!(compare_reports(&report(100.0, 10.01), &reference, 1e-3).is_err());

        // a deviation equal to the tolerance is rejected
        let zero = report(0.0, 0.0);
        assert!(compare_reports(&report(0.001, 0.0), &zero, 1e-3).is_err());
        assert!(compare_reports(&report(0.0, -0.001), &zero, 1e-3).is_err());
        assert!(compare_reports(&report(0.0009, 0.0), &zero, 1e-3).is_ok());
        // NaN never passes
        assert!(compare_reports(&report(f64::NAN, 0.0), &zero, 1e-3).is_err());
    }

    #[test]
    fn test_missing_report_is_an_error() {
        let path = env::temp_dir().join("zfs-output-does-not-exist.yml");
        assert!(read_report(&path).is_err());
    }
}
