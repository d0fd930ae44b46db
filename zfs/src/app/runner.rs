use crate::config::{Args, Config, LengthUnit};
use crate::parallel::{ProcessorGrid, World};
use crate::zfs_impl::{ZfsCalculation, ZfsError, ZfsOptions, ZfsResult};
use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing::info;
use wfc::units::ANGSTROM_TO_BOHR;
use wfc::{Cell, ModelLoader, ModelOrbital};

/// Build the orbital source described by the `system` section.
pub fn build_loader(config: &Config, args: &Args) -> Result<ModelLoader> {
    let system = &config.system;
    let [a1, a2, a3] = system.lattice;
    let (cell, orbitals) = match system.units {
        LengthUnit::Bohr => (Cell::new(a1, a2, a3)?, system.orbitals.clone()),
        LengthUnit::Angstrom => {
            let orbitals = system
                .orbitals
                .iter()
                .map(|orb| ModelOrbital {
                    center: orb.center.map(|x| x * ANGSTROM_TO_BOHR),
                    width: orb.width * ANGSTROM_TO_BOHR,
                    ..orb.clone()
                })
                .collect();
            (Cell::from_angstrom(a1, a2, a3)?, orbitals)
        }
    };

    let loader = ModelLoader::new(cell, system.density_grid, system.ecut, orbitals)
        .wrap_err("Invalid system description")?
        .with_fftgrid(config.fftgrid(args));
    Ok(loader)
}

/// Run the calculation on `nprocs` processes; returns what process 0 saw.
pub fn run_zfs(loader: &ModelLoader, options: &ZfsOptions, nprocs: usize) -> Result<ZfsResult> {
    info!("Starting ZFS calculation on {} processes", nprocs);
    let results = World::run(nprocs, |comm| -> Result<Option<ZfsResult>, ZfsError> {
        let grid = ProcessorGrid::new(comm)?;
        let result = ZfsCalculation::new(&grid, loader, options.clone()).solve()?;
        Ok(grid.onroot().then_some(result))
    })?;

    results
        .into_iter()
        .flatten()
        .next()
        .ok_or_else(|| eyre!("process 0 returned no result"))
}
