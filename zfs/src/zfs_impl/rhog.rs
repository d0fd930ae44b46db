use ndarray::{Array3, Zip};
use num_complex::Complex64;
use std::borrow::Cow;
use wfc::FourierTransform;

/// Pair density of orbitals 1 and 2 in G space,
///
/// rhog(G) = rho1(G) conj(rho2(G)) - |rho12(G)|^2
///
/// where `rho_k = F[|psi_k|^2]` and `rho12 = F[psi1 conj(psi2)]`. Single
/// orbital densities are computed unless supplied.
pub fn compute_rhog(
    psi1r: &Array3<Complex64>,
    psi2r: &Array3<Complex64>,
    ft: &FourierTransform,
    rho1g: Option<&Array3<Complex64>>,
    rho2g: Option<&Array3<Complex64>>,
) -> Array3<Complex64> {
    let rho1g = single_density(psi1r, ft, rho1g);
    let rho2g = single_density(psi2r, ft, rho2g);

    let mut overlap = Array3::<Complex64>::zeros(psi1r.raw_dim());
    Zip::from(&mut overlap)
        .and(psi1r)
        .and(psi2r)
        .for_each(|o, &p1, &p2| *o = p1 * p2.conj());
    ft.forward_inplace(&mut overlap);

    let mut rhog = Array3::<Complex64>::zeros(psi1r.raw_dim());
    Zip::from(&mut rhog)
        .and(&*rho1g)
        .and(&*rho2g)
        .and(&overlap)
        .for_each(|r, &r1, &r2, &r12| {
            *r = r1 * r2.conj() - Complex64::new(r12.norm_sqr(), 0.0);
        });
    rhog
}

fn single_density<'a>(
    psir: &Array3<Complex64>,
    ft: &FourierTransform,
    cached: Option<&'a Array3<Complex64>>,
) -> Cow<'a, Array3<Complex64>> {
    match cached {
        Some(rhog) => Cow::Borrowed(rhog),
        None => {
            let mut rho = psir.mapv(|v| Complex64::new(v.norm_sqr(), 0.0));
            ft.forward_inplace(&mut rho);
            Cow::Owned(rho)
        }
    }
}
