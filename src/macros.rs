// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

// Set initializers, like vec!, used to write the expected FIRST/FOLLOW sets and LR items

/// Generates the code to initialize a [HashSet](std::collections::HashSet).
///
/// # Example
/// ```
/// # #[macro_use] fn main() {
/// # use std::collections::HashSet;
/// # use land::hashset;
/// let tokens = hashset!["ID", "NUM", "EOF"];
/// assert_eq!(tokens, HashSet::from(["ID", "NUM", "EOF"]));
/// # }
/// ```
#[macro_export(local_inner_macros)]
macro_rules! hashset {
    () => { std::collections::HashSet::new() };
    ($($key:expr,)+) => { hashset!($($key),+) };
    ($($key:expr),*) => { std::collections::HashSet::from([ $($key,)* ]) };
}

/// Generates the code to initialize a [BTreeSet](std::collections::BTreeSet).
///
/// # Example
/// ```
/// # #[macro_use] fn main() {
/// # use std::collections::BTreeSet;
/// # use land::btreeset;
/// let rules = btreeset!["stmt", "expr"];
/// assert_eq!(rules.into_iter().collect::<Vec<_>>(), vec!["expr", "stmt"]);
/// # }
/// ```
#[macro_export(local_inner_macros)]
macro_rules! btreeset {
    () => { std::collections::BTreeSet::new() };
    ($($key:expr,)+) => { btreeset!($($key),+) };
    ($($key:expr),*) => { std::collections::BTreeSet::from([ $($key,)* ]) };
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn sets() {
        assert_eq!(hashset![1_u16, 3, 5,], HashSet::from([5, 3, 1]));
        assert_eq!(hashset!(), HashSet::<u16>::new());
        assert_eq!(btreeset!["b", "a"].into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(btreeset!(), BTreeSet::<u16>::new());
    }
}
