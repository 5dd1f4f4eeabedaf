//! Shortening of identifiers to a length budget.

const DROP_CHARS: &str = "AEIOUY";

/// Shorten `name` to at most `len` characters in a somewhat readable way.
///
/// Strategy, in order:
/// 1. drop interior vowels in pairs, taking the second and the next-to-last
///    vowel each round so the first and last vowels survive;
/// 2. if there are not enough vowels, first collapse doubled characters and
///    underscores, then drop vowels;
/// 3. elide the middle of the original and splice in the number of elided
///    characters (`INTERNATIONALIZATION` -> `INTERN8ATION`);
/// 4. plain truncation.
///
/// The result is deterministic for a given input.
pub fn trim_name(name: &str, len: usize) -> String {
    let original: Vec<char> = name.chars().collect();
    if original.len() <= len {
        return name.to_string();
    }

    let mut chars = original.clone();
    let to_drop = chars.len() - len;

    if vowel_positions(&chars).len().saturating_sub(2) < to_drop {
        chars = collapse_repeats(&chars);
    }

    drop_vowels(&mut chars, len);

    if chars.len() > len {
        if let Some(elided) = elide_middle(&original, len) {
            chars = elided;
        }
    }

    if chars.len() > len {
        chars = original[..len].to_vec();
    }

    chars.into_iter().collect()
}

fn vowel_positions(chars: &[char]) -> Vec<usize> {
    chars
        .iter()
        .enumerate()
        .filter(|(_, c)| DROP_CHARS.contains(**c))
        .map(|(i, _)| i)
        .collect()
}

/// Remove a character when it equals its successor or is an underscore.
/// The final character is always kept.
fn collapse_repeats(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        let is_last = i + 1 == chars.len();
        if !is_last && (c == '_' || c == chars[i + 1]) {
            continue;
        }
        out.push(c);
    }
    out
}

fn drop_vowels(chars: &mut Vec<char>, len: usize) {
    let mut pos = vowel_positions(chars);
    while pos.len() > 2 && chars.len() > len {
        let idx = pos.remove(1);
        chars.remove(idx);
        for p in pos.iter_mut().skip(1) {
            *p -= 1;
        }

        if pos.len() > 2 && chars.len() > len {
            let next_to_last = pos.len() - 2;
            let idx = pos.remove(next_to_last);
            chars.remove(idx);
            for p in pos.iter_mut().skip(next_to_last) {
                *p -= 1;
            }
        }
    }
}

/// Middle elision with the elided character count spliced in. Returns
/// `None` when the name is too short for the count to fit.
fn elide_middle(original: &[char], len: usize) -> Option<Vec<char>> {
    let total = original.len();
    let mut to_drop = total - len;
    // reserve room for the digits of the count itself
    to_drop += if to_drop >= 98 {
        3
    } else if to_drop >= 9 {
        2
    } else {
        1
    };

    if to_drop + 2 > total {
        return None;
    }

    let odd_corrector = 1 - (total % 2);
    let elide_first = (total + odd_corrector - to_drop) / 2;
    let elide_last = (total + odd_corrector + to_drop) / 2;

    let mut out: Vec<char> = original[..elide_first].to_vec();
    out.extend(to_drop.to_string().chars());
    out.extend_from_slice(&original[elide_last..]);
    Some(out)
}
