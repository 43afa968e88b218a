// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lazy generators over the two levels of the search space.
//!
//! Both generators hold explicit cursor state and compute the next
//! candidate on demand; neither materialises its Cartesian product.

pub mod inter_stage;
pub mod intra_stage;

/// Divisors of `n` in ascending order.
pub(crate) fn divisors(n: usize) -> Vec<usize> {
    let mut small = Vec::new();
    let mut large = Vec::new();
    let mut d = 1;
    while d * d <= n {
        if n % d == 0 {
            small.push(d);
            if d * d != n {
                large.push(n / d);
            }
        }
        d += 1;
    }
    small.extend(large.into_iter().rev());
    small
}

/// Advances `items` to the next lexicographic permutation.
///
/// Returns `false` (leaving `items` untouched) on the last permutation.
pub(crate) fn next_permutation<T: Ord>(items: &mut [T]) -> bool {
    if items.len() < 2 {
        return false;
    }
    let Some(pivot) = (0..items.len() - 1).rev().find(|&i| items[i] < items[i + 1]) else {
        return false;
    };
    let Some(successor) = (pivot + 1..items.len()).rev().find(|&j| items[j] > items[pivot]) else {
        return false;
    };
    items.swap(pivot, successor);
    items[pivot + 1..].reverse();
    true
}
