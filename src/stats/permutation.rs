//! Element sets, permutations, and exhaustive permutation-space enumeration.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SuvError};

/// Largest element set accepted; 8! = 40320 classes.
pub const MAX_ELEMENTS: usize = 8;

/// Ordered, distinct baseline tokens inserted before shuffling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ElementSet {
    tokens: Vec<String>,
}

impl ElementSet {
    /// Validate and wrap a token list.
    ///
    /// Tokens must be non-empty, distinct, free of whitespace and of the
    /// `[`/`]` characters used by the dump format.
    pub fn new<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty() {
            return Err(SuvError::InvalidTrialPlan {
                details: "element set must not be empty".to_string(),
            });
        }
        if tokens.len() > MAX_ELEMENTS {
            return Err(SuvError::InvalidTrialPlan {
                details: format!(
                    "element set has {} tokens; at most {MAX_ELEMENTS} are supported",
                    tokens.len()
                ),
            });
        }
        for (i, token) in tokens.iter().enumerate() {
            if token.is_empty()
                || token
                    .chars()
                    .any(|c| c.is_whitespace() || c == '[' || c == ']')
            {
                return Err(SuvError::InvalidTrialPlan {
                    details: format!("element token {token:?} is not a bare word"),
                });
            }
            if tokens[..i].contains(token) {
                return Err(SuvError::InvalidTrialPlan {
                    details: format!("element token {token:?} appears more than once"),
                });
            }
        }
        Ok(Self { tokens })
    }

    /// Parse a comma-separated list such as `1,2,3,4`.
    pub fn parse_list(raw: &str) -> Result<Self> {
        Self::new(raw.split(',').map(str::trim).filter(|t| !t.is_empty()))
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Size of the permutation space, k!.
    #[must_use]
    pub fn permutation_count(&self) -> usize {
        (1..=self.tokens.len()).product()
    }

    /// The ordering the program should report right after seeding.
    #[must_use]
    pub fn baseline(&self) -> Permutation {
        Permutation::new(self.tokens.clone())
    }
}

impl Default for ElementSet {
    fn default() -> Self {
        Self {
            tokens: ["1", "2", "3", "4"].map(String::from).to_vec(),
        }
    }
}

impl TryFrom<Vec<String>> for ElementSet {
    type Error = SuvError;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ElementSet> for Vec<String> {
    fn from(value: ElementSet) -> Self {
        value.tokens
    }
}

/// One ordering of tokens. Displays as its canonical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permutation {
    tokens: Vec<String>,
}

impl Permutation {
    #[must_use]
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Canonical key: `"1234"` when every token is a single character,
    /// otherwise the tokens joined by spaces (`"12 1 2"`).
    #[must_use]
    pub fn canonical(&self) -> String {
        if self.tokens.iter().all(|t| t.chars().count() <= 1) {
            self.tokens.concat()
        } else {
            self.tokens.join(" ")
        }
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Every distinguishable ordering of an element set, in lexicographic order
/// of element positions (`1234, 1243, 1324, …`).
#[derive(Debug, Clone)]
pub struct PermutationSpace {
    members: Vec<Permutation>,
    index: HashMap<Permutation, usize>,
}

impl PermutationSpace {
    /// Enumerate all k! orderings.
    #[must_use]
    pub fn enumerate(elements: &ElementSet) -> Self {
        let k = elements.len();
        let mut positions: Vec<usize> = (0..k).collect();
        let mut members = Vec::with_capacity(elements.permutation_count());
        loop {
            members.push(Permutation::new(
                positions
                    .iter()
                    .map(|&p| elements.tokens()[p].clone())
                    .collect(),
            ));
            if !next_permutation(&mut positions) {
                break;
            }
        }
        let index = members
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect();
        Self { members, index }
    }

    #[must_use]
    pub fn members(&self) -> &[Permutation] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Position of `permutation` in enumeration order, if it is a member.
    #[must_use]
    pub fn position(&self, permutation: &Permutation) -> Option<usize> {
        self.index.get(permutation).copied()
    }
}

/// Advance `items` to the next lexicographic ordering. Returns `false` once
/// the last ordering has been reached.
fn next_permutation(items: &mut [usize]) -> bool {
    let n = items.len();
    if n < 2 {
        return false;
    }
    let mut i = n - 1;
    while i > 0 && items[i - 1] >= items[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = n - 1;
    while items[j] <= items[i - 1] {
        j -= 1;
    }
    items.swap(i - 1, j);
    items[i..].reverse();
    true
}
