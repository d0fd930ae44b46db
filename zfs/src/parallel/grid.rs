use super::comm::Communicator;
use super::error::ParallelError;
use tracing::info;

/// Square 2D arrangement of the processes of a communicator.
///
/// Process `rank` sits at row `rank / s` and column `rank % s` of an `s x s`
/// grid. Row and column communicators group processes sharing a grid row or
/// column, ranked by column and row index respectively.
pub struct ProcessorGrid {
    comm: Communicator,
    row_comm: Communicator,
    col_comm: Communicator,
    side: usize,
    irow: usize,
    icol: usize,
}

impl ProcessorGrid {
    /// Collective over `comm`. Fails unless the number of processes is a
    /// perfect square.
    pub fn new(comm: &Communicator) -> Result<Self, ParallelError> {
        let size = comm.size();
        let side = square_side(size).ok_or(ParallelError::NonSquareGrid { nprocs: size })?;

        let rank = comm.rank();
        let irow = rank / side;
        let icol = rank % side;

        let row_comm = comm.split(irow, icol)?;
        let col_comm = comm.split(icol, irow)?;

        Ok(ProcessorGrid {
            comm: comm.clone(),
            row_comm,
            col_comm,
            side,
            irow,
            icol,
        })
    }

    pub fn comm(&self) -> &Communicator {
        &self.comm
    }

    pub fn row_comm(&self) -> &Communicator {
        &self.row_comm
    }

    pub fn col_comm(&self) -> &Communicator {
        &self.col_comm
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    pub fn nrow(&self) -> usize {
        self.side
    }

    pub fn ncol(&self) -> usize {
        self.side
    }

    pub fn irow(&self) -> usize {
        self.irow
    }

    pub fn icol(&self) -> usize {
        self.icol
    }

    pub fn onroot(&self) -> bool {
        self.comm.rank() == 0
    }

    pub fn is_diagonal(&self) -> bool {
        self.irow == self.icol
    }

    /// Rank of the process at the mirrored grid position `(icol, irow)`.
    pub fn transpose_rank(&self) -> usize {
        self.icol * self.side + self.irow
    }

    pub fn print_info(&self) {
        if self.onroot() {
            info!(
                "Processor grid: {} processes arranged as {} x {}",
                self.size(),
                self.nrow(),
                self.ncol()
            );
        }
    }
}

fn square_side(n: usize) -> Option<usize> {
    if n == 0 {
        return None;
    }
    let guess = (n as f64).sqrt().round() as usize;
    (guess.saturating_sub(1)..=guess + 1).find(|s| s * s == n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_side() {
        assert_eq!(square_side(1), Some(1));
        assert_eq!(square_side(4), Some(2));
        assert_eq!(square_side(9), Some(3));
        assert_eq!(square_side(144), Some(12));
        assert_eq!(square_side(2), None);
        assert_eq!(square_side(8), None);
        assert_eq!(square_side(0), None);
    }
}
