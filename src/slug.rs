//! URL slugs. Hawaiian diacritics are folded so "Lānaʻi" becomes "lanai".

/// Lowercase ASCII slug: ʻokina and apostrophes vanish, macron vowels lose the macron,
/// every other run of non-alphanumerics becomes a single dash.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        let folded = match c {
            'ʻ' | '‘' | '’' | '\'' | '`' => continue,
            'ā' | 'Ā' => 'a',
            'ē' | 'Ē' => 'e',
            'ī' | 'Ī' => 'i',
            'ō' | 'Ō' => 'o',
            'ū' | 'Ū' => 'u',
            c => c.to_ascii_lowercase(),
        };
        if folded.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(folded);
        } else {
            pending_dash = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_hawaiian_diacritics() {
        assert_eq!(slugify("Lānaʻi Living"), "lanai-living");
        assert_eq!(slugify("Hawaiʻi Kai"), "hawaii-kai");
        assert_eq!(slugify("ʻŌhiʻa Lehua"), "ohia-lehua");
    }

    #[test]
    fn collapses_separators() {
        assert_eq!(slugify("  Kitchen -- Remodel!! 2024 "), "kitchen-remodel-2024");
        assert_eq!(slugify("Kai's Bath"), "kais-bath");
        assert_eq!(slugify("!!!"), "");
    }
}
