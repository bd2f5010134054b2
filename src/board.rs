//! Board model: categories of point-valued words and their disabled flags.
//!
//! A [`Board`] is only ever built wholesale from a server snapshot
//! ([`Board::from_snapshot`]). After that the only mutation is flipping a
//! single word to disabled ([`Board::disable`]).
//!
//! Cells are laid out in column-major order: the view walks word index in the
//! outer loop and category index in the inner loop, so the `n`th button is
//! category `n % categories`, word `n / categories`.

use tracing::debug;

use crate::error::{BuzzerError, Result};
use crate::protocol::BoardPayload;

/// Stable address of one cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddress {
    /// Index of the category (column).
    pub category: usize,
    /// Index of the word within its category (row).
    pub word: usize,
}

impl CellAddress {
    pub fn new(category: usize, word: usize) -> Self {
        Self { category, word }
    }
}

/// One clue on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    points: u32,
    disabled: bool,
}

impl Word {
    /// Points awarded for this word.
    pub fn points(&self) -> u32 {
        self.points
    }

    /// Whether the word has already been chosen.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

/// A named column of words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    name: String,
    words: Vec<Word>,
}

impl Category {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }
}

/// A rendered cell, yielded by [`Board::cells`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell<'a> {
    pub address: CellAddress,
    pub word: &'a Word,
}

/// A rectangular grid of categories.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    categories: Vec<Category>,
    words_per_category: usize,
}

impl Board {
    /// Build a board from a server snapshot, replacing nothing and merging
    /// nothing: the result depends only on `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`BuzzerError::RaggedBoard`] if the categories do not all have
    /// the same number of words, and [`BuzzerError::ZeroPointWord`] if a word
    /// carries no points.
    pub fn from_snapshot(payload: &BoardPayload) -> Result<Self> {
        let words_per_category = payload.categories.first().map_or(0, |c| c.words.len());

        let mut categories = Vec::with_capacity(payload.categories.len());
        for (category_index, category) in payload.categories.iter().enumerate() {
            if category.words.len() != words_per_category {
                return Err(BuzzerError::RaggedBoard {
                    category: category_index,
                    expected: words_per_category,
                    found: category.words.len(),
                });
            }

            let mut words = Vec::with_capacity(words_per_category);
            for (word_index, word) in category.words.iter().enumerate() {
                if word.point_value == 0 {
                    return Err(BuzzerError::ZeroPointWord {
                        category: category_index,
                        word: word_index,
                    });
                }
                let address = CellAddress::new(category_index, word_index);
                let disabled = payload
                    .disabled_cells
                    .iter()
                    .any(|cell| CellAddress::new(cell.category_index, cell.word_index) == address);
                words.push(Word {
                    points: word.point_value,
                    disabled,
                });
            }

            categories.push(Category {
                name: category.name.clone(),
                words,
            });
        }

        let board = Self {
            categories,
            words_per_category,
        };

        for cell in &payload.disabled_cells {
            let address = CellAddress::new(cell.category_index, cell.word_index);
            if board.word(address).is_none() {
                debug!(?address, "snapshot disables a cell that is not on the board");
            }
        }

        Ok(board)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn words_per_category(&self) -> usize {
        self.words_per_category
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.categories.len() * self.words_per_category
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The word at `address`, if it is on the board.
    pub fn word(&self, address: CellAddress) -> Option<&Word> {
        self.categories
            .get(address.category)
            .and_then(|c| c.words.get(address.word))
    }

    /// Address of the `index`th cell in column-major render order.
    pub fn address_at(&self, index: usize) -> Option<CellAddress> {
        if index >= self.len() {
            return None;
        }
        let categories = self.categories.len();
        Some(CellAddress::new(index % categories, index / categories))
    }

    /// All cells in column-major render order.
    pub fn cells(&self) -> impl Iterator<Item = Cell<'_>> + '_ {
        (0..self.words_per_category).flat_map(move |word| {
            self.categories
                .iter()
                .enumerate()
                .filter_map(move |(category, c)| {
                    c.words.get(word).map(|w| Cell {
                        address: CellAddress::new(category, word),
                        word: w,
                    })
                })
        })
    }

    /// Addresses of all disabled cells, in column-major order.
    pub fn disabled_cells(&self) -> Vec<CellAddress> {
        self.cells()
            .filter(|cell| cell.word.disabled)
            .map(|cell| cell.address)
            .collect()
    }

    /// Mark the cell at `address` disabled.
    ///
    /// Returns `true` if the flag flipped, `false` if the cell was already
    /// disabled or is not on the board.
    pub fn disable(&mut self, address: CellAddress) -> bool {
        let Some(word) = self
            .categories
            .get_mut(address.category)
            .and_then(|c| c.words.get_mut(address.word))
        else {
            return false;
        };
        if word.disabled {
            return false;
        }
        word.disabled = true;
        true
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{CategoryPayload, DisabledCellPayload, WordPayload};

    fn payload(categories: usize, words: usize, disabled: &[(usize, usize)]) -> BoardPayload {
        BoardPayload {
            categories: (0..categories)
                .map(|c| CategoryPayload {
                    name: format!("Category {c}"),
                    words: (0..words)
                        .map(|w| WordPayload {
                            point_value: (w as u32 + 1) * 100,
                        })
                        .collect(),
                })
                .collect(),
            disabled_cells: disabled
                .iter()
                .map(|&(category_index, word_index)| DisabledCellPayload {
                    category_index,
                    word_index,
                })
                .collect(),
        }
    }

    #[test]
    fn snapshot_builds_rectangular_grid() {
        let board = Board::from_snapshot(&payload(3, 4, &[])).unwrap();
        assert_eq!(board.category_count(), 3);
        assert_eq!(board.words_per_category(), 4);
        assert_eq!(board.len(), 12);
        assert_eq!(board.categories()[2].name(), "Category 2");
        assert_eq!(board.word(CellAddress::new(1, 3)).unwrap().points(), 400);
        assert!(board.disabled_cells().is_empty());
    }

    #[test]
    fn snapshot_seeds_disabled_cells_by_exact_address() {
        let board = Board::from_snapshot(&payload(2, 3, &[(1, 0), (0, 2)])).unwrap();
        assert_eq!(
            board.disabled_cells(),
            vec![CellAddress::new(1, 0), CellAddress::new(0, 2)]
        );
        assert!(!board.word(CellAddress::new(0, 0)).unwrap().is_disabled());
        assert!(!board.word(CellAddress::new(1, 2)).unwrap().is_disabled());
    }

    #[test]
    fn snapshot_ignores_disabled_cells_off_the_board() {
        let board = Board::from_snapshot(&payload(2, 2, &[(5, 0), (0, 9)])).unwrap();
        assert!(board.disabled_cells().is_empty());
    }

    #[test]
    fn ragged_board_is_rejected() {
        let mut p = payload(3, 2, &[]);
        p.categories[1].words.pop();
        let err = Board::from_snapshot(&p).unwrap_err();
        assert!(matches!(
            err,
            BuzzerError::RaggedBoard {
                category: 1,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn zero_point_word_is_rejected() {
        let mut p = payload(2, 2, &[]);
        p.categories[0].words[1].point_value = 0;
        let err = Board::from_snapshot(&p).unwrap_err();
        assert!(matches!(
            err,
            BuzzerError::ZeroPointWord {
                category: 0,
                word: 1
            }
        ));
    }

    #[test]
    fn empty_board_is_accepted() {
        let board = Board::from_snapshot(&payload(0, 0, &[])).unwrap();
        assert!(board.is_empty());
        assert_eq!(board.cells().count(), 0);
        assert_eq!(board.address_at(0), None);
    }

    #[test]
    fn cells_are_column_major() {
        let board = Board::from_snapshot(&payload(3, 2, &[])).unwrap();
        let order: Vec<_> = board
            .cells()
            .map(|c| (c.address.category, c.address.word))
            .collect();
        assert_eq!(order, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn nth_cell_maps_to_modulo_and_quotient() {
        let (c, w) = (4, 5);
        let board = Board::from_snapshot(&payload(c, w, &[])).unwrap();
        for (n, cell) in board.cells().enumerate() {
            assert_eq!(cell.address, CellAddress::new(n % c, n / c));
            assert_eq!(board.address_at(n), Some(cell.address));
        }
        assert_eq!(board.address_at(c * w), None);
    }

    #[test]
    fn disable_is_idempotent() {
        let mut board = Board::from_snapshot(&payload(2, 2, &[])).unwrap();
        let addr = CellAddress::new(1, 1);
        assert!(board.disable(addr));
        let once = board.clone();
        assert!(!board.disable(addr));
        assert_eq!(board, once);
        assert_eq!(board.disabled_cells(), vec![addr]);
    }

    #[test]
    fn disable_out_of_range_changes_nothing() {
        let mut board = Board::from_snapshot(&payload(2, 2, &[])).unwrap();
        let before = board.clone();
        assert!(!board.disable(CellAddress::new(2, 0)));
        assert!(!board.disable(CellAddress::new(0, 2)));
        assert_eq!(board, before);
    }
}
