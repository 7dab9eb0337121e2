//! Exact-match substring search.
//!
//! A `Finder` owns a pattern together with the three Boyer-Moore shift
//! tables (bad-character, good-suffix, full-shift) derived from the
//! Z-function of the pattern. Building the tables is the only allocation
//! of note in the whole crate, so callers scanning many haystacks should
//! build one `Finder` per distinct pattern and reuse it; a `Finder` is
//! immutable after construction and safe to share across threads.

/// Precomputed search state for one pattern.
#[derive(Debug, Clone)]
pub struct Finder {
    pattern: Vec<u8>,
    /// `bad[c][i]`: rightmost position of byte `c` strictly before
    /// pattern position `i - 1` (row length is `pattern.len() + 1`).
    bad: Vec<Vec<isize>>,
    good: Vec<isize>,
    full: Vec<usize>,
}

impl Finder {
    /// Build the shift tables for `pattern`.
    ///
    /// Patterns shorter than 4 bytes get empty tables; [`Finder::is_match`]
    /// then always takes the naive scanning path.
    pub fn new(pattern: &[u8]) -> Finder {
        let n = pattern.len();
        if n < 4 {
            return Finder { pattern: pattern.to_vec(), bad: Vec::new(), good: Vec::new(), full: Vec::new() };
        }

        // Bad-character table: one row per byte value, one column per
        // pattern position plus the leading "not seen yet" entry.
        let mut bad = vec![vec![-1isize]; 256];
        let mut alfa = [-1isize; 256];
        for (i, &c) in pattern.iter().enumerate() {
            alfa[c as usize] = i as isize;
            for (row, &a) in bad.iter_mut().zip(alfa.iter()) {
                row.push(a);
            }
        }

        // Good-suffix table, from the Z-function of the reversed pattern.
        let mut good = vec![-1isize; n];
        let rpattern: Vec<u8> = pattern.iter().rev().copied().collect();
        let z0 = fundamental(&rpattern);
        let mut suf = vec![0usize; n];
        for (i, &v) in z0.iter().enumerate() {
            suf[n - i - 1] = v;
        }
        for (j, &v) in suf.iter().enumerate().take(n - 1) {
            let i = n - v;
            if i != n {
                good[i] = j as isize;
            }
        }

        // Full-shift table, from the Z-function of the pattern as given,
        // keeping a running "longest prefix that is also a suffix here".
        let mut full = vec![0usize; n];
        let z0 = fundamental(pattern);
        let mut z = vec![0usize; n];
        for (i, &v) in z0.iter().enumerate() {
            z[n - i - 1] = v;
        }
        let mut longest = 0usize;
        for (i, &zv) in z.iter().enumerate() {
            if zv == i + 1 && zv > longest {
                longest = zv;
            }
            full[n - i - 1] = longest;
        }

        Finder { pattern: pattern.to_vec(), bad, good, full }
    }

    /// The pattern this finder was built for.
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Return true when the pattern occurs in `haystack`.
    ///
    /// Falls back to a naive scan for patterns shorter than 4 bytes,
    /// haystacks shorter than 64 bytes, or haystacks carrying a NUL byte
    /// within their first 1024 bytes (heuristic guard against binary
    /// data). Otherwise runs Boyer-Moore with the Galil rule, so already
    /// verified suffixes are never compared twice.
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        let pattern = &self.pattern;
        let n = pattern.len();
        if n == 0 {
            return true;
        }
        if haystack.len() < n {
            return false;
        }
        if n < 4 || haystack.len() < 64 {
            return naive(haystack, pattern);
        }
        let max = haystack.len().min(1024);
        if haystack[..max].contains(&0) {
            log::trace!("haystack looks binary, falling back to naive scan");
            return naive(haystack, pattern);
        }

        let mut k = n - 1;
        // Galil bookkeeping: rightmost haystack index already verified.
        let mut previous_k: isize = -1;
        while k < haystack.len() {
            let mut i = n as isize - 1;
            let mut h = k as isize;
            while i >= 0 && h > previous_k && pattern[i as usize] == haystack[h as usize] {
                i -= 1;
                h -= 1;
            }
            if i == -1 || h == previous_k {
                return true;
            }
            let char_shift = i - self.bad[haystack[h as usize] as usize][i as usize];
            let suffix_shift: isize = if i + 1 == n as isize {
                1
            } else if self.good[(i + 1) as usize] == -1 {
                (n - self.full[(i + 1) as usize]) as isize
            } else {
                n as isize - 1 - self.good[(i + 1) as usize]
            };
            let shift = char_shift.max(suffix_shift);
            if shift >= i + 1 {
                previous_k = k as isize;
            }
            k += shift as usize;
        }
        false
    }
}

/// Naive containment check, the fallback for inputs where the shift
/// tables do not pay off.
fn naive(haystack: &[u8], pattern: &[u8]) -> bool {
    if pattern.is_empty() {
        return true;
    }
    if haystack.len() < pattern.len() {
        return false;
    }
    haystack.windows(pattern.len()).any(|w| w == pattern)
}

/// Z-function ("fundamental" array): `z[i]` is the length of the longest
/// substring starting at `i` that matches a prefix, with `z[0]` set to the
/// full length.
fn fundamental(pattern: &[u8]) -> Vec<usize> {
    let n = pattern.len();
    let mut z = vec![0usize; n];
    if n == 0 {
        return z;
    }
    if n == 1 {
        z[0] = 1;
        return z;
    }

    z[0] = n;
    z[1] = match_length(pattern, 0, 1);
    for i in 2..=z[1] {
        z[i] = z[1] - i + 1;
    }
    let mut l = 0usize;
    let mut r = 0usize;
    for i in (2 + z[1])..n {
        if i <= r {
            let k = i - l;
            let b = z[k];
            let a = r - i + 1;
            if b < a {
                z[i] = b;
            } else {
                z[i] = a + match_length(pattern, a, r + 1);
                l = i;
                r = i + z[i] - 1;
            }
            continue;
        }
        z[i] = match_length(pattern, 0, i);
        if z[i] > 0 {
            l = i;
            r = i + z[i] - 1;
        }
    }
    z
}

fn match_length(s: &[u8], mut i: usize, mut j: usize) -> usize {
    if i == j {
        return s.len() - i;
    }
    let mut count = 0;
    while i < s.len() && j < s.len() && s[i] == s[j] {
        count += 1;
        i += 1;
        j += 1;
    }
    count
}
