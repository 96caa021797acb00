#![forbid(unsafe_code)]

//! The closed sum of readable reactive values.
//!
//! Code that accepts "anything readable" takes a [`Reactive<T>`] and
//! dispatches by match; there is no runtime brand check or downcasting
//! anywhere in the engine. Resources are not part of the sum: they are owned
//! lifecycle entities, not plain readable values, and live in a downstream
//! crate.

use weft_core::Stability;

use crate::cell::Cell;
use crate::memo::Memo;

/// A readable reactive value: a leaf cell or a derived memo.
pub enum Reactive<T> {
    Cell(Cell<T>),
    Memo(Memo<T>),
}

impl<T> Clone for Reactive<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Cell(cell) => Self::Cell(cell.clone()),
            Self::Memo(memo) => Self::Memo(memo.clone()),
        }
    }
}

impl<T: 'static> Reactive<T> {
    /// Access the current value by reference, with the underlying
    /// primitive's tracking (and, for memos, revalidation) semantics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match self {
            Self::Cell(cell) => cell.with(f),
            Self::Memo(memo) => memo.with(f),
        }
    }

    #[must_use]
    pub fn stability(&self) -> Stability {
        match self {
            Self::Cell(cell) => cell.stability(),
            Self::Memo(memo) => memo.stability(),
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Cell(cell) => cell.description(),
            Self::Memo(memo) => memo.description(),
        }
    }
}

impl<T: Clone + 'static> Reactive<T> {
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T> From<Cell<T>> for Reactive<T> {
    fn from(cell: Cell<T>) -> Self {
        Self::Cell(cell)
    }
}

impl<T> From<Memo<T>> for Reactive<T> {
    fn from(memo: Memo<T>) -> Self {
        Self::Memo(memo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::Timeline;

    #[test]
    fn dispatches_to_either_variant() {
        let timeline = Timeline::new();
        let cell = Cell::named(&timeline, 2, "base");

        let source = cell.clone();
        let memo = Memo::new(&timeline, move || source.get() * 3);

        let values: Vec<Reactive<i32>> = vec![cell.clone().into(), memo.into()];
        let total: i32 = values.iter().map(Reactive::get).sum();
        assert_eq!(total, 8);

        cell.set(4).unwrap();
        let total: i32 = values.iter().map(Reactive::get).sum();
        assert_eq!(total, 16);
    }

    #[test]
    fn tracked_reads_flow_through_the_sum() {
        let timeline = Timeline::new();
        let reactive: Reactive<i32> = Cell::named(&timeline, 1, "leaf").into();

        let (_, frame) = timeline.with_frame("reader", || reactive.get());
        assert_eq!(frame.dep_count(), 1);
    }
}
