//! Integration tests for the ZFS application
//!
//! These tests run the example YAML files end to end and check that the
//! result does not depend on how pairs are distributed over processes.

use std::path::PathBuf;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use approx::assert_relative_eq;
    use clap::Parser;
    use zfs::app::{build_loader, load_config, run_zfs, ZfsApplication};
    use zfs::config::Args;
    use zfs::io::read_report;
    use zfs::ZfsOptions;

    /// Helper function to get the path to example files
    fn example_path(filename: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("example")
            .join(filename)
    }

    fn args_for(filename: &str, extra: &[&str]) -> Args {
        let config = example_path(filename);
        let mut argv = vec!["zfs", "-c", config.to_str().unwrap()];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("zfs-it-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_triplet_is_axial() {
        let args = args_for("triplet_p2.yaml", &[]);
        let config = load_config(&args).unwrap();
        let loader = build_loader(&config, &args).unwrap();
        let result = run_zfs(&loader, &config.zfs_options(&args), 1).unwrap();

        // the unoccupied pz orbital is skipped
        assert_eq!(result.norbs, 4);
        assert_eq!((result.nuorbs, result.ndorbs), (3, 1));

        let t = &result.tensor;
        assert!(t.d_value.abs() > 1.0);
        assert!(t.e_value.abs() < 1e-3 * t.d_value.abs());
        let trace = t.d[(0, 0)] + t.d[(1, 1)] + t.d[(2, 2)];
        assert!(trace.abs() < 1e-6 * t.d_value.abs());
        // principal axis along z
        assert!(t.eigenvectors[(2, 2)].abs() > 0.999);
        assert!(result.max_imag_ratio < 1e-4);
    }

    #[test]
    fn test_process_count_does_not_change_result() {
        let args = args_for("triplet_p2.yaml", &[]);
        let config = load_config(&args).unwrap();
        let loader = build_loader(&config, &args).unwrap();
        let options = config.zfs_options(&args);

        let serial = run_zfs(&loader, &options, 1).unwrap();
        for nprocs in [4, 9] {
            let parallel = run_zfs(&loader, &options, nprocs).unwrap();
            assert_eq!(parallel.nprocs, nprocs);
            assert!((parallel.tensor.d_value - serial.tensor.d_value).abs() < 1e-3);
            assert!((parallel.tensor.e_value - serial.tensor.e_value).abs() < 1e-3);
            assert_eq!(parallel.iglobal.shape(), serial.iglobal.shape());
            for (a, b) in parallel.iglobal.iter().zip(serial.iglobal.iter()) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_memory_modes_and_backends_agree() {
        let args = args_for("triplet_p2.yaml", &[]);
        let config = load_config(&args).unwrap();
        let loader = build_loader(&config, &args).unwrap();
        let reference = run_zfs(&loader, &ZfsOptions::default(), 1).unwrap();

        for extra in [
            ["--memory", "high", "--backend", "serial"],
            ["--memory", "low", "--backend", "threaded"],
        ] {
            let args = args_for("triplet_p2.yaml", &extra);
            let result = run_zfs(&loader, &config.zfs_options(&args), 4).unwrap();
            assert_relative_eq!(
                result.tensor.d_value,
                reference.tensor.d_value,
                epsilon = 1e-6,
                max_relative = 1e-9
            );
        }
    }

    #[test]
    fn test_angstrom_input_matches_bohr_input() {
        let bohr_args = args_for("triplet_p2.yaml", &[]);
        let bohr_config = load_config(&bohr_args).unwrap();
        let bohr = run_zfs(
            &build_loader(&bohr_config, &bohr_args).unwrap(),
            &bohr_config.zfs_options(&bohr_args),
            1,
        )
        .unwrap();

        let args = args_for("triplet_p2_angstrom.yaml", &[]);
        let config = load_config(&args).unwrap();
        let angstrom = run_zfs(
            &build_loader(&config, &args).unwrap(),
            &config.zfs_options(&args),
            1,
        )
        .unwrap();

        assert_relative_eq!(
            angstrom.tensor.d_value,
            bohr.tensor.d_value,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_application_writes_and_compares_outputs() {
        let dir = scratch("app");
        let out = dir.to_str().unwrap().to_string();

        let args = args_for("triplet_p2.yaml", &["--path", out.as_str()]);
        let config = load_config(&args).unwrap();
        ZfsApplication::new(args, config).execute().unwrap();

        let report_path = dir.join("zfs.yml");
        assert!(dir.join("Iijab.npy").exists());
        let report = read_report(&report_path).unwrap();
        assert_eq!(report.object, "zfs");
        assert_eq!(report.norbs, 4);
        assert_eq!(report.memory, "critical");

        // same system on four processes must reproduce the written report
        let second = dir.join("second");
        let args = args_for(
            "triplet_p2.yaml",
            &[
                "--nprocs",
                "4",
                "--path",
                second.to_str().unwrap(),
                "--compare",
                report_path.to_str().unwrap(),
            ],
        );
        let config = load_config(&args).unwrap();
        ZfsApplication::new(args, config).execute().unwrap();
        assert_eq!(read_report(&second.join("zfs.yml")).unwrap().nprocs, 4);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_non_square_process_count_is_rejected() {
        let dir = scratch("nonsquare");
        let args = args_for(
            "triplet_p2.yaml",
            &["--nprocs", "2", "--path", dir.to_str().unwrap()],
        );
        let config = load_config(&args).unwrap();
        let err = ZfsApplication::new(args, config).execute().unwrap_err();
        assert!(format!("{:#}", err).contains("square"));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_config_file() {
        let args = Args::parse_from(["zfs", "-c", "/nonexistent/zfs.yaml"]);
        let err = load_config(&args).unwrap_err();
        assert!(format!("{}", err).contains("Unable to read configuration file"));
    }
}
