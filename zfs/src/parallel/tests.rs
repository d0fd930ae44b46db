//! Tests for the communicator, processor grid and distributed matrix

#[cfg(test)]
mod tests {
    use super::super::{ParallelError, ProcessorGrid, SymmetricDistributedMatrix, World};
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn random_symmetric(n: usize, seed: u64) -> Array3<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut a = Array3::<f64>::zeros((n, n, 6));
        for i in 0..n {
            for j in i..n {
                for k in 0..6 {
                    let v = rng.gen_range(-1.0..1.0);
                    a[[i, j, k]] = v;
                    a[[j, i, k]] = v;
                }
            }
        }
        a
    }

    #[test]
    fn test_collectives() {
        let results = World::run(4, |comm| {
            let rank = comm.rank();

            let gathered = comm.gather(rank * 10)?;
            if comm.is_root() {
                assert_eq!(gathered, Some(vec![0, 10, 20, 30]));
            } else {
                assert_eq!(gathered, None);
            }

            let mut msg = if comm.is_root() {
                "hello".to_string()
            } else {
                String::new()
            };
            comm.broadcast(&mut msg)?;
            assert_eq!(msg, "hello");

            let all = comm.all_gather(rank)?;
            assert_eq!(all, vec![0, 1, 2, 3]);

            let total: f64 = comm.all_reduce_sum(rank as f64 + 0.5)?;
            assert_eq!(total, 8.0);

            // ring exchange
            let size = comm.size();
            let right = (rank + 1) % size;
            let left = (rank + size - 1) % size;
            let from_left: usize = comm.sendrecv(right, left, 3, &rank)?;
            assert_eq!(from_left, left);

            comm.barrier()?;
            Ok::<_, ParallelError>(rank)
        })
        .unwrap();
        assert_eq!(results, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_split_orders_members_by_key() {
        let results = World::run(6, |comm| {
            let rank = comm.rank();
            // evens and odds, reversed order inside each group
            let sub = comm.split(rank % 2, 100 - rank)?;
            let members = sub.all_gather(rank)?;
            let total = sub.all_reduce_sum(rank)?;
            Ok::<_, ParallelError>((sub.rank(), sub.size(), members, total))
        })
        .unwrap();

        assert_eq!(results[0], (2, 3, vec![4, 2, 0], 6));
        assert_eq!(results[1], (2, 3, vec![5, 3, 1], 9));
        assert_eq!(results[4], (0, 3, vec![4, 2, 0], 6));
    }

    #[test]
    fn test_failure_is_reported_with_root_cause() {
        let result: Result<Vec<()>, ParallelError> = World::run(4, |comm| {
            if comm.rank() == 2 {
                return Err(ParallelError::ShapeMismatch("boom".to_string()));
            }
            // would block forever without the abort
            let _: usize = comm.recv(2, 5)?;
            Ok(())
        });
        match result {
            Err(ParallelError::ShapeMismatch(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_panic_is_reported() {
        let result: Result<Vec<()>, ParallelError> = World::run(4, |comm| {
            if comm.rank() == 1 {
                panic!("process 1 gives up");
            }
            comm.barrier()?;
            Ok(())
        });
        assert!(matches!(result, Err(ParallelError::Panicked { rank: 1 })));
    }

    #[test]
    fn test_processor_grid_layout() {
        let results = World::run(9, |comm| {
            let grid = ProcessorGrid::new(comm)?;
            let row_members = grid.row_comm().all_gather(grid.rank())?;
            let col_members = grid.col_comm().all_gather(grid.rank())?;
            Ok::<_, ParallelError>((
                grid.irow(),
                grid.icol(),
                grid.transpose_rank(),
                row_members,
                col_members,
            ))
        })
        .unwrap();

        let (irow, icol, transpose, row_members, col_members) = &results[5];
        assert_eq!((*irow, *icol), (1, 2));
        assert_eq!(*transpose, 7);
        assert_eq!(row_members, &vec![3, 4, 5]);
        assert_eq!(col_members, &vec![2, 5, 8]);
    }

    #[test]
    fn test_non_square_grid_rejected() {
        for nprocs in [2, 3, 5, 8] {
            let result = World::run(nprocs, |comm| ProcessorGrid::new(comm).map(|_| ()));
            assert!(matches!(
                result,
                Err(ParallelError::NonSquareGrid { nprocs: n }) if n == nprocs
            ));
        }
    }

    #[test]
    fn test_triu_iter_covers_every_pair_once() {
        for nprocs in [1, 4, 9] {
            for n in [1, 2, 3, 5, 7, 10] {
                let per_process = World::run(nprocs, |comm| {
                    let grid = ProcessorGrid::new(comm)?;
                    let mat = SymmetricDistributedMatrix::new(&grid, (n, n, 6))?;
                    let pairs: Vec<(usize, usize)> = mat
                        .triu_iter()
                        .map(|(iloc, jloc)| {
                            assert!(mat.computes(iloc, jloc));
                            mat.ltog(iloc, jloc)
                        })
                        .collect();
                    // restartable
                    assert_eq!(mat.triu_iter().count(), pairs.len());
                    Ok::<_, ParallelError>(pairs)
                })
                .unwrap();

                let all: Vec<(usize, usize)> = per_process
                    .into_iter()
                    .flatten()
                    .map(|(i, j)| (i.min(j), i.max(j)))
                    .collect();
                let unique: HashSet<_> = all.iter().copied().collect();
                assert_eq!(all.len(), n * (n + 1) / 2, "P = {}, n = {}", nprocs, n);
                assert_eq!(unique.len(), all.len(), "P = {}, n = {}", nprocs, n);
            }
        }
    }

    #[test]
    fn test_symmetrize_and_collect() {
        for nprocs in [1, 4, 9] {
            for n in [2, 5, 8] {
                let reference = random_symmetric(n, 7 + n as u64);
                let collected = World::run(nprocs, |comm| {
                    let grid = ProcessorGrid::new(comm)?;
                    let mut mat = SymmetricDistributedMatrix::new(&grid, (n, n, 6))?;
                    let cells: Vec<_> = mat.triu_iter().collect();
                    for (iloc, jloc) in cells {
                        let (i, j) = mat.ltog(iloc, jloc);
                        let values: Vec<f64> = (0..6).map(|k| reference[[i, j, k]]).collect();
                        mat.write(iloc, jloc, &values);
                    }
                    mat.symmetrize()?;

                    for iloc in 0..mat.mloc() {
                        for jloc in 0..mat.nloc() {
                            let (i, j) = mat.ltog(iloc, jloc);
                            assert_eq!(mat.get(iloc, jloc)[3], reference[[i, j, 3]]);
                        }
                    }
                    mat.collect()
                })
                .unwrap();

                for full in collected {
                    assert_eq!(full, reference, "P = {}, n = {}", nprocs, n);
                }
            }
        }
    }

    #[test]
    fn test_ltog_gtol() {
        World::run(4, |comm| {
            let grid = ProcessorGrid::new(comm)?;
            let mat = SymmetricDistributedMatrix::new(&grid, (5, 5, 6))?;
            // 5 rows over 2 grid rows: [0, 2) and [2, 5)
            let expected_rows = if grid.irow() == 0 { (0, 2) } else { (2, 5) };
            assert_eq!((mat.mstart(), mat.mend()), expected_rows);
            for iloc in 0..mat.mloc() {
                for jloc in 0..mat.nloc() {
                    let (i, j) = mat.ltog(iloc, jloc);
                    assert_eq!(mat.gtol(i, j), Some((iloc, jloc)));
                }
            }
            assert_eq!(mat.gtol(5, 0), None);
            Ok::<_, ParallelError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_write_outside_block_is_fatal() {
        let result = World::run(1, |comm| {
            let grid = ProcessorGrid::new(comm)?;
            let mut mat = SymmetricDistributedMatrix::new(&grid, (3, 3, 6))?;
            mat.write(3, 0, &[0.0; 6]);
            Ok::<_, ParallelError>(())
        });
        assert!(matches!(result, Err(ParallelError::Panicked { rank: 0 })));
    }

    #[test]
    fn test_rectangular_matrix_rejected() {
        let result = World::run(1, |comm| {
            let grid = ProcessorGrid::new(comm)?;
            SymmetricDistributedMatrix::new(&grid, (3, 4, 6)).map(|_| ())
        });
        assert!(matches!(result, Err(ParallelError::ShapeMismatch(_))));
    }
}
