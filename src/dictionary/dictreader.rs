//! Open and read .dict or .dict.dz files.
//!
//! This module contains traits and structs to work with uncompressed .dict and compressed .dict.dz
//! files. These files contain the actual dictionary content. While these readers return the
//! definitions, they do not do any post-processing. Definitions are normally plain text, but they
//! could be HTML, or anything else, in theory (although plain text is the de facto default).
//!
//! Every read is positioned: no reader keeps a cursor, so a reader can be shared between threads.
//!
//! To understand some of the constants defined in this module or to understand the internals of
//! the DictReaderDz struct, it is advisable to have a brief look at
//! [the GZip standard](https://tools.ietf.org/html/rfc1952).

use std::io;
use std::fs::File;
use std::ffi::OsStr;
use std::path::Path;
use std::os::unix::fs::FileExt;

use byteorder::{ByteOrder, LittleEndian};

use super::charset::Charset;
use super::errors::DataAccessError;
use crate::settings::Settings;

/// Byte mask to query for existence of FEXTRA field in the flags byte of a `.dz` file.
pub const GZ_FEXTRA: u8 = 0b0000_0100;
/// Byte mask to query for the existence of a file name in a `.dz` file.
pub const GZ_FNAME: u8 = 0b0000_1000;
/// Byte mask to query for the existence of a comment in a `.dz` file.
pub const GZ_COMMENT: u8 = 0b0001_0000;
/// Byte mask to detect that a header CRC is contained in a `.dz` file.
pub const GZ_FHCRC: u8 = 0b0000_0010;

/// Random access to bytes.
pub trait ReadAt: Send + Sync {
    /// Fill `buf` with the bytes starting at `offset`.
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()>;
    fn size(&self) -> io::Result<u64>;
}

impl ReadAt for File {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        FileExt::read_exact_at(self, buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        self.metadata().map(|m| m.len())
    }
}

impl ReadAt for Vec<u8> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let eof = || io::Error::new(io::ErrorKind::UnexpectedEof, "read beyond the end of the buffer");
        let start = usize::try_from(offset).ok().filter(|&s| s <= self.len()).ok_or_else(eof)?;
        let end = start.checked_add(buf.len()).filter(|&e| e <= self.len()).ok_or_else(eof)?;
        buf.copy_from_slice(&self[start..end]);
        Ok(())
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

/// A dictionary (content) reader.
///
/// This type abstracts from the underlying read operations required for lookup of headwords and
/// provides easy methods to search for a word given a certain offset and length. Users of a type
/// which implements this trait don't need to care about compression of the dictionary.
pub trait DictReader: Send + Sync {
    /// Fetch the definition from the dictionary at offset and length.
    fn fetch_definition(&self, start_offset: u64, length: u64) -> Result<String, DataAccessError>;
    /// Size of the uncompressed content.
    fn content_length(&self) -> u64;
}

fn check_range(start_offset: u64, length: u64, extent: u64, limit: u64) -> Result<(), DataAccessError> {
    if length > limit {
        return Err(DataAccessError::TooLarge { length, limit });
    }
    if start_offset.checked_add(length).map_or(true, |end| end > extent) {
        return Err(DataAccessError::OutOfBounds { offset: start_offset, length, extent });
    }
    Ok(())
}

/// Raw Dict reader.
///
/// This reader can read uncompressed .dict files.
pub struct DictReaderRaw<R: ReadAt> {
    dict_data: R,
    total_length: u64,
    charset: Charset,
    max_bytes: u64,
}

impl<R: ReadAt> DictReaderRaw<R> {
    pub fn new(dict_data: R, charset: Charset, max_bytes: u64) -> Result<DictReaderRaw<R>, DataAccessError> {
        let total_length = dict_data.size()?;
        Ok(DictReaderRaw { dict_data, total_length, charset, max_bytes })
    }
}

impl<R: ReadAt> DictReader for DictReaderRaw<R> {
    fn fetch_definition(&self, start_offset: u64, length: u64) -> Result<String, DataAccessError> {
        check_range(start_offset, length, self.total_length, self.max_bytes)?;
        let mut read_data = vec![0; length as usize];
        self.dict_data.read_exact_at(&mut read_data, start_offset)?;
        Ok(self.charset.decode(read_data)?)
    }

    fn content_length(&self) -> u64 {
        self.total_length
    }
}

/// Load a `DictReader` from file.
///
/// This function loads a `DictReader` from a file and transparently selects the correct reader
/// using the file type extension, so the callee doesn't need to care about compression (`.dz`).
///
/// # Errors
///
/// The function can return a `DataAccessError`, which can either occur if a I/O error occurs, or
/// when the GZ compressed file is invalid.
pub fn load_dict<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<Box<dyn DictReader>, DataAccessError> {
    let file = File::open(path.as_ref())?;
    if path.as_ref().extension() == Some(OsStr::new("dz")) {
        Ok(Box::new(DictReaderDz::new(file, settings.charset, settings.max_definition_size)?))
    } else {
        Ok(Box::new(DictReaderRaw::new(file, settings.charset, settings.max_definition_size)?))
    }
}

/// Gzip Dict reader
///
/// This reader can read compressed .dict files with the file name suffix .dz.
/// This format is documented in RFC 1952 and in `man dictzip`. An example implementation can be
/// found in the dict daemon (dictd) in `data.c`.
pub struct DictReaderDz<R: ReadAt> {
    /// Compressed DZ dictionary.
    dzdict: R,
    /// Length of an uncompressed chunk.
    uchunk_length: usize,
    /// End of compressed data.
    end_compressed_data: u64,
    /// Offsets in file where a new compressed chunk starts.
    chunk_offsets: Vec<u64>,
    /// Total size of uncompressed file.
    ufile_length: u64,
    charset: Charset,
    max_bytes: u64,
}

fn invalid(explanation: &str) -> DataAccessError {
    DataAccessError::InvalidFileFormat(explanation.to_string())
}

// Position right after the next zero byte.
fn skip_zero_terminated<R: ReadAt>(data: &R, mut pos: u64, size: u64) -> Result<u64, DataAccessError> {
    let mut buf = [0u8; 256];
    while pos < size {
        let n = (size - pos).min(buf.len() as u64) as usize;
        data.read_exact_at(&mut buf[..n], pos)?;
        if let Some(i) = buf[..n].iter().position(|&b| b == 0) {
            return Ok(pos + i as u64 + 1);
        }
        pos += n as u64;
    }
    Err(invalid("unterminated field in gzip header"))
}

impl<R: ReadAt> DictReaderDz<R> {
    pub fn new(dzdict: R, charset: Charset, max_bytes: u64) -> Result<DictReaderDz<R>, DataAccessError> {
        let size = dzdict.size()?;
        if size < 18 {
            return Err(invalid("file too short for gzip"));
        }

        let mut header = [0u8; 12];
        dzdict.read_exact_at(&mut header, 0)?;
        if header[0..2] != [0x1F, 0x8B] {
            return Err(invalid("not in gzip format"));
        }
        if header[2] != 8 {
            return Err(invalid("unknown gzip compression method"));
        }

        let flags = header[3]; // Bitmap of gzip attributes.
        if (flags & GZ_FEXTRA) == 0 {
            return Err(invalid("extra flag (FLG.FEXTRA) not set, not in gzip + dzip format"));
        }

        // Read XLEN, length of extra FEXTRA field.
        let xlen = LittleEndian::read_u16(&header[10..12]) as usize;
        if xlen < 10 {
            return Err(invalid("FEXTRA field too short for dictzip"));
        }

        // Read FEXTRA data.
        let mut fextra = vec![0u8; xlen];
        dzdict.read_exact_at(&mut fextra, 12)?;

        if fextra[0..2] != [b'R', b'A'] {
            return Err(invalid("no dictzip info found in FEXTRA header (behind XLEN, in SI1SI2 fields)"));
        }

        // The length of the subfield should be the same as the FEXTRA field, ignoring the
        // additional length information and the file format identification.
        let length_subfield = LittleEndian::read_u16(&fextra[2..4]) as usize;
        if length_subfield != xlen - 4 {
            return Err(invalid("dictzip subfield length doesn't match XLEN"));
        }
        let subf_version = LittleEndian::read_u16(&fextra[4..6]);
        if subf_version != 1 {
            return Err(invalid("unimplemented dictzip version, only ver 1 supported"));
        }

        // Before compression, the file is split into evenly-sized chunks and the size information
        // is put right after the version information.
        let uchunk_length = LittleEndian::read_u16(&fextra[6..8]) as usize;
        let chunk_count = LittleEndian::read_u16(&fextra[8..10]) as usize;
        if uchunk_length == 0 || chunk_count == 0 {
            return Err(invalid("no compressed chunks in file or broken header information"));
        }

        // The first 10 bytes of FEXTRA are header information, the rest are 2-byte, little-endian
        // numbers.
        let numbers_chunks_which_would_fit = (xlen - 10) / 2;
        if numbers_chunks_which_would_fit != chunk_count {
            return Err(DataAccessError::InvalidFileFormat(format!(
                "expected {} chunks according to dictzip header, but the FEXTRA field can \
                 accomodate {}; possibly broken file", chunk_count, numbers_chunks_which_would_fit)));
        }

        let mut pos = 12 + xlen as u64;

        // If file name bit set, seek beyond the 0-terminated file name, we don't care.
        if (flags & GZ_FNAME) != 0 {
            pos = skip_zero_terminated(&dzdict, pos, size)?;
        }

        // Seek past comment, if any.
        if (flags & GZ_COMMENT) != 0 {
            pos = skip_zero_terminated(&dzdict, pos, size)?;
        }

        // Skip CRC stuff, 2 bytes.
        if (flags & GZ_FHCRC) != 0 {
            pos += 2;
        }

        let mut chunk_offsets = Vec::with_capacity(chunk_count);
        for compressed_len in fextra[10..10 + 2 * chunk_count].chunks_exact(2) {
            chunk_offsets.push(pos);
            pos += LittleEndian::read_u16(compressed_len) as u64;
        }
        // Position of last compressed byte, followed by CRC32 and ISIZE.
        let end_compressed_data = pos;
        if end_compressed_data + 8 > size {
            return Err(invalid("truncated dictzip file"));
        }

        // ISIZE, the last field of the trailer.
        let mut trailer = [0u8; 4];
        dzdict.read_exact_at(&mut trailer, size - 4)?;
        let ufile_length = LittleEndian::read_u32(&trailer) as u64;
        if ufile_length > (chunk_count * uchunk_length) as u64 {
            return Err(invalid("uncompressed size exceeds the announced chunks"));
        }

        Ok(DictReaderDz { dzdict, uchunk_length, end_compressed_data, chunk_offsets,
                          ufile_length, charset, max_bytes })
    }

    // Inflate a dictdz chunk.
    fn inflate_chunk(&self, id: usize) -> Result<Vec<u8>, DataAccessError> {
        let start = *self.chunk_offsets.get(id).ok_or_else(|| invalid("chunk index out of range"))?;
        let end = self.chunk_offsets.get(id + 1).copied().unwrap_or(self.end_compressed_data);
        let mut compressed = vec![0u8; (end - start) as usize];
        self.dzdict.read_exact_at(&mut compressed, start)?;

        let mut decoder = flate2::Decompress::new(false);
        let mut decoded = vec![0u8; self.uchunk_length];
        decoder.decompress(&compressed, &mut decoded, flate2::FlushDecompress::None)?;
        decoded.truncate(decoder.total_out() as usize);
        Ok(decoded)
    }
}

impl<R: ReadAt> DictReader for DictReaderDz<R> {
    fn fetch_definition(&self, start_offset: u64, length: u64) -> Result<String, DataAccessError> {
        check_range(start_offset, length, self.ufile_length, self.max_bytes)?;
        if length == 0 {
            return Ok(String::new());
        }

        let uchunk_length = self.uchunk_length as u64;
        let end_offset = start_offset + length;
        let first_chunk = (start_offset / uchunk_length) as usize;
        let last_chunk = ((end_offset - 1) / uchunk_length) as usize;

        let mut data = Vec::with_capacity(length as usize);
        for id in first_chunk..=last_chunk {
            let chunk = self.inflate_chunk(id)?;
            let chunk_start = id as u64 * uchunk_length;
            // Cut what precedes and follows the definition.
            let from = start_offset.saturating_sub(chunk_start) as usize;
            let to = ((end_offset - chunk_start) as usize).min(chunk.len());
            if from >= to {
                return Err(invalid("chunk shorter than announced"));
            }
            data.extend_from_slice(&chunk[from..to]);
        }

        if data.len() as u64 != length {
            return Err(invalid("chunk shorter than announced"));
        }

        Ok(self.charset.decode(data)?)
    }

    fn content_length(&self) -> u64 {
        self.ufile_length
    }
}
