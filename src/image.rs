//! Program image representation and file format.
//!
//! The binary contract between the assembler and the runtime is a flat
//! file of unsigned 64-bit words in native byte order: no header, no
//! magic number, length equal to the number of emitted words. The
//! conventional extension is `.fb`. A file whose length is not a word
//! multiple is padded with zero bytes into its final word, matching how
//! the loader sizes main memory.

use std::fs;
use std::io;
use std::path::Path;

/// Word size of the machine, in bytes.
pub const WORD_BYTES: usize = 8;

/// Conventional extension for program image files.
pub const IMAGE_EXTENSION: &str = ".fb";

/// A flat sequence of words: the assembler's emitted artifact and the
/// runtime's loaded program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    words: Vec<u64>,
}

impl Image {
    /// Wraps an already-built word sequence.
    pub fn from_words(words: Vec<u64>) -> Self {
        Self { words }
    }

    /// The image's words in address order.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Consumes the image, yielding its words.
    pub fn into_words(self) -> Vec<u64> {
        self.words
    }

    /// Number of words in the image.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the image holds no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Serializes the image in native byte order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.words.len() * WORD_BYTES);
        for word in &self.words {
            out.extend_from_slice(&word.to_ne_bytes());
        }
        out
    }

    /// Deserializes an image, zero-padding a trailing partial word.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let words = bytes
            .chunks(WORD_BYTES)
            .map(|chunk| {
                let mut buf = [0u8; WORD_BYTES];
                buf[..chunk.len()].copy_from_slice(chunk);
                u64::from_ne_bytes(buf)
            })
            .collect();
        Self { words }
    }

    /// Reads an image file.
    pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::from_bytes(&fs::read(path)?))
    }

    /// Writes the image to a file, replacing any previous contents.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let image = Image::from_words(vec![0, 5, 7, u64::MAX]);
        let decoded = Image::from_bytes(&image.to_bytes());
        assert_eq!(decoded, image);
    }

    #[test]
    fn empty() {
        let image = Image::from_bytes(&[]);
        assert!(image.is_empty());
        assert!(image.to_bytes().is_empty());
    }

    #[test]
    fn partial_trailing_word_is_zero_padded() {
        let mut bytes = 1u64.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&2u64.to_ne_bytes()[..3]);
        let image = Image::from_bytes(&bytes);
        assert_eq!(image.len(), 2);
        assert_eq!(image.words()[0], 1);
        // The partial word keeps only the bytes that were present.
        let mut expected = [0u8; WORD_BYTES];
        expected[..3].copy_from_slice(&2u64.to_ne_bytes()[..3]);
        assert_eq!(image.words()[1], u64::from_ne_bytes(expected));
    }

    #[test]
    fn byte_order_is_native() {
        let image = Image::from_words(vec![0x0102_0304_0506_0708]);
        assert_eq!(image.to_bytes(), 0x0102_0304_0506_0708u64.to_ne_bytes());
    }
}
