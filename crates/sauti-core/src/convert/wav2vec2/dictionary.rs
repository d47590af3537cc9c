//! Fairseq target dictionaries and label files.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{Error, Result};

const OVERWRITE_FLAG: &str = "#fairseq:overwrite";

/// Symbol table of a fine-tuned fairseq model: `<s>`, `<pad>`, `</s>`,
/// `<unk>` followed by the entries of the dictionary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    symbols: Vec<String>,
    counts: Vec<i64>,
    indices: HashMap<String, usize>,
    pub bos_word: String,
    pub pad_word: String,
    pub eos_word: String,
    pub unk_word: String,
    pub bos_index: usize,
    pub pad_index: usize,
    pub eos_index: usize,
    pub unk_index: usize,
}

impl Default for Dictionary {
    fn default() -> Self {
        let mut dict = Self {
            symbols: Vec::new(),
            counts: Vec::new(),
            indices: HashMap::new(),
            bos_word: "<s>".to_string(),
            pad_word: "<pad>".to_string(),
            eos_word: "</s>".to_string(),
            unk_word: "<unk>".to_string(),
            bos_index: 0,
            pad_index: 0,
            eos_index: 0,
            unk_index: 0,
        };
        dict.bos_index = dict.add_symbol("<s>", 1, false);
        dict.pad_index = dict.add_symbol("<pad>", 1, false);
        dict.eos_index = dict.add_symbol("</s>", 1, false);
        dict.unk_index = dict.add_symbol("<unk>", 1, false);
        dict
    }
}

impl Dictionary {
    /// Reads `<symbol> <count> [#fairseq:overwrite]` lines.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut dict = Self::default();
        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            dict.add_from_line(line).map_err(|e| {
                Error::ConfigError(format!("{}:{}: {e}", path.display(), line_number + 1))
            })?;
        }
        Ok(dict)
    }

    fn add_from_line(&mut self, line: &str) -> std::result::Result<(), String> {
        let malformed = || "Incorrect dictionary format, expected '<token> <cnt> [flags]'".to_string();

        let (mut rest, mut field) = line.rsplit_once(' ').ok_or_else(malformed)?;
        let overwrite = field == OVERWRITE_FLAG;
        if overwrite {
            (rest, field) = rest.rsplit_once(' ').ok_or_else(malformed)?;
        }
        let count: i64 = field.parse().map_err(|_| malformed())?;
        let word = rest;

        if self.indices.contains_key(word) && !overwrite {
            return Err(format!(
                "Duplicate word found when loading Dictionary: '{word}'. Duplicate words can \
                 overwrite earlier ones by adding the {OVERWRITE_FLAG} flag at the end of the \
                 corresponding row in the dictionary file."
            ));
        }
        self.add_symbol(word, count, overwrite);
        Ok(())
    }

    /// Returns the index of `word`, appending it unless already present.
    pub fn add_symbol(&mut self, word: &str, count: i64, overwrite: bool) -> usize {
        if let Some(&idx) = self.indices.get(word) {
            if !overwrite {
                self.counts[idx] += count;
                return idx;
            }
        }
        let idx = self.symbols.len();
        self.indices.insert(word.to_string(), idx);
        self.symbols.push(word.to_string());
        self.counts.push(count);
        idx
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn index(&self, word: &str) -> Option<usize> {
        self.indices.get(word).copied()
    }

    /// Vocabulary for a CTC tokenizer. `<pad>` must be id 0 since it is the
    /// CTC blank, so it trades places with `<s>`.
    pub fn ctc_vocab(&self) -> BTreeMap<String, u32> {
        let mut vocab: BTreeMap<String, u32> = self
            .indices
            .iter()
            .map(|(word, &idx)| (word.clone(), idx as u32))
            .collect();
        vocab.insert(self.pad_word.clone(), 0);
        vocab.insert(self.bos_word.clone(), 1);
        vocab
    }
}

/// Label file of a classification model: line number → first word, blank
/// lines skipped but still counted.
pub fn read_txt_into_dict(path: &Path) -> Result<BTreeMap<usize, String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .enumerate()
        .filter_map(|(line_number, line)| {
            line.split_whitespace()
                .next()
                .map(|word| (line_number, word.to_string()))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dict_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn specials_come_first() {
        let file = dict_file("| 94802\nE 51860\nT 38431\n");
        let dict = Dictionary::load(file.path()).unwrap();
        assert_eq!(dict.len(), 7);
        assert_eq!(dict.bos_index, 0);
        assert_eq!(dict.pad_index, 1);
        assert_eq!(dict.eos_index, 2);
        assert_eq!(dict.unk_index, 3);
        assert_eq!(dict.index("|"), Some(4));
    }

    #[test]
    fn ctc_vocab_swaps_pad_and_bos() {
        let file = dict_file("A 10\n");
        let vocab = Dictionary::load(file.path()).unwrap().ctc_vocab();
        assert_eq!(vocab["<pad>"], 0);
        assert_eq!(vocab["<s>"], 1);
        assert_eq!(vocab["</s>"], 2);
        assert_eq!(vocab["A"], 4);
    }

    #[test]
    fn duplicates_need_overwrite_flag() {
        let file = dict_file("A 10\nA 3\n");
        assert!(Dictionary::load(file.path()).is_err());

        let file = dict_file("A 10\nA 3 #fairseq:overwrite\n");
        let dict = Dictionary::load(file.path()).unwrap();
        assert_eq!(dict.len(), 6);
        assert_eq!(dict.index("A"), Some(5));
    }

    #[test]
    fn malformed_line_is_rejected() {
        let file = dict_file("A ten\n");
        assert!(matches!(
            Dictionary::load(file.path()),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn label_file_keeps_line_numbers() {
        let file = dict_file("yes 1\n\nno 2\n");
        let labels = read_txt_into_dict(file.path()).unwrap();
        assert_eq!(labels.get(&0).map(String::as_str), Some("yes"));
        assert_eq!(labels.get(&1), None);
        assert_eq!(labels.get(&2).map(String::as_str), Some("no"));
    }
}
