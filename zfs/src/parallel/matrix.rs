//! Symmetric matrix distributed over a square processor grid
//!
//! A logical `(n, n, t)` array symmetric in its first two indices. The
//! process at grid position `(r, c)` stores the block of rows `r` and
//! columns `c`, with the trailing dimension kept whole.

use super::error::ParallelError;
use super::grid::ProcessorGrid;
use ndarray::{s, Array3, ArrayView1, ArrayView3};
use tracing::info;

const TAG_SYMMETRIZE: u32 = 17;

/// `[start, end)` of block `b` when `n` items are cut into `nblocks` blocks.
/// All blocks have `n / nblocks` items except the last, which takes the rest.
pub fn block_range(n: usize, nblocks: usize, b: usize) -> (usize, usize) {
    let base = n / nblocks;
    let start = b * base;
    let end = if b + 1 == nblocks { n } else { start + base };
    (start, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Diagonal,
    Upper,
    Lower,
}

pub struct SymmetricDistributedMatrix<'g> {
    grid: &'g ProcessorGrid,
    shape: (usize, usize, usize),
    mstart: usize,
    mend: usize,
    nstart: usize,
    nend: usize,
    kind: BlockKind,
    val: Array3<f64>,
}

impl<'g> SymmetricDistributedMatrix<'g> {
    /// Allocate the local block of a zero `(m, n, t)` matrix; `m` must equal `n`.
    pub fn new(grid: &'g ProcessorGrid, shape: (usize, usize, usize)) -> Result<Self, ParallelError> {
        let (m, n, t) = shape;
        if m != n {
            return Err(ParallelError::ShapeMismatch(format!(
                "symmetric matrix must be square, got {} x {}",
                m, n
            )));
        }

        let (mstart, mend) = block_range(m, grid.nrow(), grid.irow());
        let (nstart, nend) = block_range(n, grid.ncol(), grid.icol());
        let kind = if grid.irow() == grid.icol() {
            BlockKind::Diagonal
        } else if grid.irow() < grid.icol() {
            BlockKind::Upper
        } else {
            BlockKind::Lower
        };

        Ok(SymmetricDistributedMatrix {
            grid,
            shape,
            mstart,
            mend,
            nstart,
            nend,
            kind,
            val: Array3::zeros((mend - mstart, nend - nstart, t)),
        })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    pub fn mstart(&self) -> usize {
        self.mstart
    }

    pub fn mend(&self) -> usize {
        self.mend
    }

    pub fn nstart(&self) -> usize {
        self.nstart
    }

    pub fn nend(&self) -> usize {
        self.nend
    }

    pub fn mloc(&self) -> usize {
        self.mend - self.mstart
    }

    pub fn nloc(&self) -> usize {
        self.nend - self.nstart
    }

    pub fn val(&self) -> ArrayView3<'_, f64> {
        self.val.view()
    }

    pub fn get(&self, iloc: usize, jloc: usize) -> ArrayView1<'_, f64> {
        self.val.slice(s![iloc, jloc, ..])
    }

    pub fn nbytes(&self) -> usize {
        self.val.len() * std::mem::size_of::<f64>()
    }

    /// Global indices of local cell `(iloc, jloc)`.
    pub fn ltog(&self, iloc: usize, jloc: usize) -> (usize, usize) {
        (self.mstart + iloc, self.nstart + jloc)
    }

    /// Local indices of global cell `(i, j)`, if it lives in this block.
    pub fn gtol(&self, i: usize, j: usize) -> Option<(usize, usize)> {
        if (self.mstart..self.mend).contains(&i) && (self.nstart..self.nend).contains(&j) {
            Some((i - self.mstart, j - self.nstart))
        } else {
            None
        }
    }

    /// Store the trailing vector of local cell `(iloc, jloc)`.
    ///
    /// # Panics
    ///
    /// If the cell is outside the local block or `values` has the wrong length.
    pub fn write(&mut self, iloc: usize, jloc: usize, values: &[f64]) {
        assert!(
            iloc < self.mloc() && jloc < self.nloc(),
            "cell ({}, {}) outside local block {} x {}",
            iloc,
            jloc,
            self.mloc(),
            self.nloc()
        );
        assert_eq!(values.len(), self.shape.2, "trailing dimension mismatch");
        self.val
            .slice_mut(s![iloc, jloc, ..])
            .assign(&ArrayView1::from(values));
    }

    /// Local cells this process has to compute.
    ///
    /// Across the grid every unordered global pair `{i, j}` is produced by
    /// exactly one process. Diagonal blocks take their upper triangle. An
    /// off-diagonal block and its mirror split the work in half: the upper
    /// block takes the first half of its cells in row-major order, the lower
    /// block the mirror images of the second half.
    pub fn triu_iter(&self) -> TriuIter {
        let (mloc, nloc) = (self.mloc(), self.nloc());
        let total = mloc * nloc;
        let half = (total + 1) / 2;
        let (next, end) = match self.kind {
            BlockKind::Diagonal => (0, total),
            BlockKind::Upper => (0, half),
            BlockKind::Lower => (half, total),
        };
        TriuIter {
            kind: self.kind,
            mloc,
            nloc,
            next,
            end,
        }
    }

    /// Whether `triu_iter` yields local cell `(iloc, jloc)`.
    pub fn computes(&self, iloc: usize, jloc: usize) -> bool {
        let (mloc, nloc) = (self.mloc(), self.nloc());
        let half = (mloc * nloc + 1) / 2;
        match self.kind {
            BlockKind::Diagonal => iloc <= jloc,
            BlockKind::Upper => iloc * nloc + jloc < half,
            BlockKind::Lower => jloc * mloc + iloc >= half,
        }
    }

    /// Fill every cell not produced by `triu_iter` with its mirror value.
    ///
    /// Collective over the grid.
    pub fn symmetrize(&mut self) -> Result<(), ParallelError> {
        let (mloc, nloc, t) = self.val.dim();

        if self.kind == BlockKind::Diagonal {
            for iloc in 0..mloc {
                for jloc in 0..iloc {
                    for k in 0..t {
                        self.val[[iloc, jloc, k]] = self.val[[jloc, iloc, k]];
                    }
                }
            }
            return Ok(());
        }

        let partner = self.grid.transpose_rank();
        let mirror: Array3<f64> =
            self.grid
                .comm()
                .sendrecv(partner, partner, TAG_SYMMETRIZE, &self.val)?;
        if mirror.dim() != (nloc, mloc, t) {
            return Err(ParallelError::ShapeMismatch(format!(
                "mirror block from process {} is {:?}, expected {:?}",
                partner,
                mirror.dim(),
                (nloc, mloc, t)
            )));
        }

        for iloc in 0..mloc {
            for jloc in 0..nloc {
                if !self.computes(iloc, jloc) {
                    for k in 0..t {
                        self.val[[iloc, jloc, k]] = mirror[[jloc, iloc, k]];
                    }
                }
            }
        }
        Ok(())
    }

    /// Assemble the full matrix on every process.
    ///
    /// Collective over the grid: blocks are first joined along grid rows into
    /// strips, then strips are joined along grid columns.
    pub fn collect(&self) -> Result<Array3<f64>, ParallelError> {
        let (m, n, t) = self.shape;
        let mloc = self.mloc();

        let blocks = self
            .grid
            .row_comm()
            .all_gather((self.nstart, self.val.clone()))?;
        let mut strip = Array3::<f64>::zeros((mloc, n, t));
        for (nstart, block) in blocks {
            let (bm, bn, bt) = block.dim();
            if bm != mloc || bt != t || nstart + bn > n {
                return Err(ParallelError::ShapeMismatch(format!(
                    "block {:?} at column {} does not fit a strip of {:?}",
                    block.dim(),
                    nstart,
                    strip.dim()
                )));
            }
            strip
                .slice_mut(s![.., nstart..nstart + bn, ..])
                .assign(&block);
        }

        let strips = self.grid.col_comm().all_gather((self.mstart, strip))?;
        let mut full = Array3::<f64>::zeros((m, n, t));
        for (mstart, strip) in strips {
            let (sm, sn, st) = strip.dim();
            if sn != n || st != t || mstart + sm > m {
                return Err(ParallelError::ShapeMismatch(format!(
                    "strip {:?} at row {} does not fit a matrix of {:?}",
                    strip.dim(),
                    mstart,
                    full.dim()
                )));
            }
            full.slice_mut(s![mstart..mstart + sm, .., ..])
                .assign(&strip);
        }
        Ok(full)
    }

    pub fn print_info(&self, name: &str) {
        if self.grid.onroot() {
            let (m, n, t) = self.shape;
            info!(
                "{}: global shape ({}, {}, {}), local block ({}, {}, {}) on process 0, {:.2} MB",
                name,
                m,
                n,
                t,
                self.mloc(),
                self.nloc(),
                t,
                self.nbytes() as f64 / 1024f64.powi(2)
            );
        }
    }
}

/// Iterator over the local cells a process computes; see
/// [`SymmetricDistributedMatrix::triu_iter`].
#[derive(Debug, Clone)]
pub struct TriuIter {
    kind: BlockKind,
    mloc: usize,
    nloc: usize,
    next: usize,
    end: usize,
}

impl Iterator for TriuIter {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.end {
            let k = self.next;
            self.next += 1;
            match self.kind {
                BlockKind::Diagonal => {
                    let (iloc, jloc) = (k / self.nloc, k % self.nloc);
                    if iloc <= jloc {
                        return Some((iloc, jloc));
                    }
                }
                BlockKind::Upper => return Some((k / self.nloc, k % self.nloc)),
                // k runs over the mirror block, which is nloc x mloc
                BlockKind::Lower => return Some((k % self.mloc, k / self.mloc)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_range_last_block_takes_remainder() {
        assert_eq!(block_range(10, 3, 0), (0, 3));
        assert_eq!(block_range(10, 3, 1), (3, 6));
        assert_eq!(block_range(10, 3, 2), (6, 10));
        assert_eq!(block_range(2, 3, 0), (0, 0));
        assert_eq!(block_range(2, 3, 2), (0, 2));
        assert_eq!(block_range(7, 1, 0), (0, 7));
    }
}
