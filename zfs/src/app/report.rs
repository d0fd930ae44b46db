use crate::io::{compare_reports, read_report, write_npy, write_report, ZfsReport};
use crate::zfs_impl::ZfsResult;
use color_eyre::eyre::{Result, WrapErr};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn report_summary(result: &ZfsResult) {
    let t = &result.tensor;
    info!("\nZFS calculation finished.");
    info!(
        "{} orbitals ({} up, {} down) on {} processes",
        result.norbs, result.nuorbs, result.ndorbs, result.nprocs
    );

    info!("\nTotal D tensor (MHz):");
    for a in 0..3 {
        info!(
            "  {:>12.3} {:>12.3} {:>12.3}",
            t.d[(a, 0)],
            t.d[(a, 1)],
            t.d[(a, 2)]
        );
    }

    info!("\nPrincipal values (MHz) and axes:");
    for (label, k) in [("Dy", 0), ("Dx", 1), ("Dz", 2)] {
        info!(
            "  {} = {:>12.3}  [{:+.4}, {:+.4}, {:+.4}]",
            label,
            t.eigenvalues[k],
            t.eigenvectors[(0, k)],
            t.eigenvectors[(1, k)],
            t.eigenvectors[(2, k)]
        );
    }

    info!("\nD = {:.2} MHz", t.d_value);
    info!("E = {:.2} MHz", t.e_value);
}

/// Write `Iijab.npy` (optional) and `zfs.yml` into `path`.
pub fn write_outputs(result: &ZfsResult, path: &Path, npy: bool) -> Result<ZfsReport> {
    fs::create_dir_all(path)
        .wrap_err_with(|| format!("Unable to create output directory: {}", path.display()))?;

    if npy {
        let file = path.join("Iijab.npy");
        write_npy(&file, &result.iglobal)?;
        info!("Pair contributions written to {}", file.display());
    }

    let report = ZfsReport::from_result(result);
    let file = path.join("zfs.yml");
    write_report(&file, &report)?;
    info!("Summary written to {}", file.display());
    Ok(report)
}

pub fn report_comparison(report: &ZfsReport, reference: &Path, tolerance: f64) -> Result<()> {
    info!("\nComparing with reference {}", reference.display());
    let reference = read_report(reference)?;
    compare_reports(report, &reference, tolerance)?;
    info!("D and E agree with the reference within {:.1e} MHz", tolerance);
    Ok(())
}
