//! Support for RLE Lossless image decoding.
//!
//! implementation taken from Pydicom:
//! <https://github.com/pydicom/pydicom/blob/master/pydicom/pixel_data_handlers/rle_handler.py>
//!
//! Copyright 2008-2021 pydicom authors.
//!
//! License: <https://github.com/pydicom/pydicom/blob/master/LICENSE>
use byteordered::byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use dicom_core::ops::AttributeOp;
use dicom_encoding::adapters::{
    decode_error, encode_error, DecodeResult, EncodeOptions, EncodeResult, PixelDataObject,
    PixelDataReader, PixelDataWriter,
};
use dicom_encoding::snafu::prelude::*;
use dicom_encoding::{submit_transfer_syntax, Codec, NeverAdapter, TransferSyntax};
use std::io::{self, Read, Seek, Write};

/// Pixel data adapter for the RLE Lossless transfer syntax.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RleLosslessAdapter;

// upgrade the `RLE_LOSSLESS` stub in `entries` with a real codec whenever
// this module is compiled in.
submit_transfer_syntax! {
    TransferSyntax::<NeverAdapter, _, _>::new_ele(
        "1.2.840.10008.1.2.5",
        "RLE Lossless",
        Codec::EncapsulatedPixelData(Some(RleLosslessAdapter), Some(RleLosslessAdapter)),
    )
}

/// Pixel data decoder for RLE Lossless (UID `1.2.840.10008.1.2.5`)
impl PixelDataReader for RleLosslessAdapter {
    /// Decode the DICOM image from RLE Lossless completely.
    ///
    /// See <https://dicom.nema.org/medical/dicom/2023e/output/chtml/part05/chapter_G.html>
    fn decode(&self, src: &dyn PixelDataObject, dst: &mut Vec<u8>) -> DecodeResult<()> {
        let cols = src
            .cols()
            .context(decode_error::MissingAttributeSnafu { name: "Columns" })?;
        let rows = src
            .rows()
            .context(decode_error::MissingAttributeSnafu { name: "Rows" })?;
        let samples_per_pixel =
            src.samples_per_pixel()
                .context(decode_error::MissingAttributeSnafu {
                    name: "SamplesPerPixel",
                })?;
        let bits_allocated = src
            .bits_allocated()
            .context(decode_error::MissingAttributeSnafu {
                name: "BitsAllocated",
            })?;

        if bits_allocated != 8 && bits_allocated != 16 {
            whatever!("BitsAllocated other than 8 or 16 is not supported");
        }
        // For RLE the number of fragments = number of frames
        // therefore, we can fetch the fragments one by one
        let nr_frames =
            src.number_of_fragments()
                .whatever_context("Invalid pixel data, no fragments found")? as usize;
        let bytes_per_sample = (bits_allocated / 8) as usize;
        let samples_per_pixel = samples_per_pixel as usize;
        // `stride` is the total number of bytes for each sample plane
        let stride = bytes_per_sample * cols as usize * rows as usize;
        let frame_size = stride * samples_per_pixel;
        // extend `dst` to make room for decoded pixel data
        let base_offset = dst.len();
        dst.resize(base_offset + frame_size * nr_frames, 0);

        // RLE encoded data is ordered like this (for 16-bit, 3 sample):
        //  Segment: 0     | 1     | 2     | 3     | 4     | 5
        //           R MSB | R LSB | G MSB | G LSB | B MSB | B LSB
        //  A segment contains only the MSB or LSB parts of all the sample pixels

        // As currently required,
        // we need to rearrange the pixel data to standard planar configuration.
        // (and use little endian byte ordering):
        //    Pixel 1                             | ... Pixel N
        //    Red         Green       Blue        | ...
        //    LSB R MSB R LSB G MSB G LSB B MSB B | ...

        for i in 0..nr_frames {
            let fragment = &src
                .fragment(i)
                .whatever_context("No pixel data found for frame")?;
            let mut offsets = read_rle_header(fragment);
            offsets.push(fragment.len() as u32);

            for sample_number in 0..samples_per_pixel {
                for byte_offset in (0..bytes_per_sample).rev() {
                    // ii is 1, 0, 3, 2, 5, 4 for the example above
                    // This is where the segment order correction occurs
                    let ii = sample_number * bytes_per_sample + byte_offset;
                    let segment = &fragment[offsets[ii] as usize..offsets[ii + 1] as usize];
                    let buff = io::Cursor::new(segment);
                    let (_, decoder) = PackBitsReader::new(buff, segment.len())
                        .whatever_context("Failed to read RLE segments")?;
                    let mut decoded_segment = Vec::with_capacity(rows as usize * cols as usize);
                    decoder
                        .take(rows as u64 * cols as u64)
                        .read_to_end(&mut decoded_segment)
                        .unwrap();

                    // Interleave pixels as described in the example above.
                    // in 16-bit, this is:
                    // MSB R channel: 1,  7, 13, ...
                    // LSB R channel: 0,  6, 12, ...
                    // MSB G channel: 3,  9, 15, ...
                    // LSB G channel: 2,  8, 14, ...
                    // MSB G channel: 5, 11, 17, ...
                    // LSB G channel: 4, 10, 16, ...
                    let frame_start = i * frame_size;
                    let start = frame_start +  if samples_per_pixel == 3 {
                        sample_number * bytes_per_sample + byte_offset
                    } else {
                        sample_number * bytes_per_sample + samples_per_pixel - byte_offset
                    };

                    let end = (i + 1) * frame_size;
                    for (decoded_index, dst_index) in (start..end)
                        .step_by(bytes_per_sample * samples_per_pixel)
                        .enumerate()
                    {
                        dst[base_offset + dst_index] = decoded_segment[decoded_index];
                    }
                }
            }
        }
        Ok(())
    }

    /// Decode a singe frame of the DICOM image from RLE Lossless.
    ///
    /// See <https://dicom.nema.org/medical/dicom/2023e/output/chtml/part05/chapter_G.html>
    fn decode_frame(
        &self,
        src: &dyn PixelDataObject,
        frame: u32,
        dst: &mut Vec<u8>,
    ) -> DecodeResult<()> {
        let cols = src
            .cols()
            .context(decode_error::MissingAttributeSnafu { name: "Columns" })?;
        let rows = src
            .rows()
            .context(decode_error::MissingAttributeSnafu { name: "Rows" })?;
        let samples_per_pixel =
            src.samples_per_pixel()
                .context(decode_error::MissingAttributeSnafu {
                    name: "SamplesPerPixel",
                })?;
        let bits_allocated = src
            .bits_allocated()
            .context(decode_error::MissingAttributeSnafu {
                name: "BitsAllocated",
            })?;

        if bits_allocated != 8 && bits_allocated != 16 {
            whatever!("BitsAllocated other than 8 or 16 is not supported");
        }
        // For RLE the number of fragments = number of frames
        // therefore, we can fetch the fragments one by one
        let nr_frames =
            src.number_of_fragments()
                .whatever_context("Invalid pixel data, no fragments found")? as usize;
        ensure!(
            nr_frames > frame as usize,
            decode_error::FrameRangeOutOfBoundsSnafu
        );

        let bytes_per_sample = (bits_allocated / 8) as usize;
        let samples_per_pixel = samples_per_pixel as usize;
        // `stride` is the total number of bytes for each sample plane
        let stride = bytes_per_sample * cols as usize * rows as usize;
        let frame_size = stride * samples_per_pixel;
        // extend `dst` to make room for decoded pixel data
        let base_offset = dst.len();
        dst.resize(base_offset + frame_size, 0);

        // RLE encoded data is ordered like this (for 16-bit, 3 sample):
        //  Segment: 0     | 1     | 2     | 3     | 4     | 5
        //           R MSB | R LSB | G MSB | G LSB | B MSB | B LSB
        //  A segment contains only the MSB or LSB parts of all the sample pixels

        // As currently required,
        // we need to rearrange the pixel data to standard planar configuration.
        // (and use little endian byte ordering):
        //    Pixel 1                             | ... Pixel N
        //    Red         Green       Blue        | ...
        //    LSB R MSB R LSB G MSB G LSB B MSB B | ...

        let fragment = &src
            .fragment(frame as usize)
            .whatever_context("No pixel data found for frame")?;
        let mut offsets = read_rle_header(fragment);
        offsets.push(fragment.len() as u32);

        for sample_number in 0..samples_per_pixel {
            for byte_offset in (0..bytes_per_sample).rev() {
                // ii is 1, 0, 3, 2, 5, 4 for the example above
                // This is where the segment order correction occurs
                let ii = sample_number * bytes_per_sample + byte_offset;
                let segment = &fragment[offsets[ii] as usize..offsets[ii + 1] as usize];
                let buff = io::Cursor::new(segment);
                let (_, decoder) = PackBitsReader::new(buff, segment.len())
                    .map_err(|e| Box::new(e) as Box<_>)
                    .whatever_context("Failed to read RLE segments")?;
                let mut decoded_segment = Vec::with_capacity(rows as usize * cols as usize);
                decoder
                    .take(rows as u64 * cols as u64)
                    .read_to_end(&mut decoded_segment)
                    .unwrap();

                // Interleave pixels as described in the example above.
                let start = if samples_per_pixel == 3 {
                    sample_number * bytes_per_sample + byte_offset
                } else {
                    sample_number * bytes_per_sample + samples_per_pixel - byte_offset
                };

                let end = frame_size;
                for (decoded_index, dst_index) in (start..end)
                    .step_by(bytes_per_sample * samples_per_pixel)
                    .enumerate()
                {
                    dst[base_offset + dst_index] = decoded_segment[decoded_index];
                }
            }
        }
        Ok(())
    }
}

impl PixelDataWriter for RleLosslessAdapter {
    /// Encode a single frame of native pixel data into RLE Lossless.
    ///
    /// See <https://dicom.nema.org/medical/dicom/2023e/output/chtml/part05/chapter_G.html>
    fn encode_frame(
        &self,
        src: &dyn PixelDataObject,
        frame: u32,
        _options: EncodeOptions,
        dst: &mut Vec<u8>,
    ) -> EncodeResult<Vec<AttributeOp>> {
        let cols = src
            .cols()
            .context(encode_error::MissingAttributeSnafu { name: "Columns" })?;
        let rows = src
            .rows()
            .context(encode_error::MissingAttributeSnafu { name: "Rows" })?;
        let samples_per_pixel =
            src.samples_per_pixel()
                .context(encode_error::MissingAttributeSnafu {
                    name: "SamplesPerPixel",
                })?;
        let bits_allocated = src
            .bits_allocated()
            .context(encode_error::MissingAttributeSnafu {
                name: "BitsAllocated",
            })?;

        ensure_whatever!(
            bits_allocated == 8 || bits_allocated == 16,
            "BitsAllocated other than 8 or 16 is not supported"
        );

        let bytes_per_sample = (bits_allocated / 8) as usize;
        let samples_per_pixel = samples_per_pixel as usize;
        let npixels = rows as usize * cols as usize;

        let frame_data = src
            .fragment(frame as usize)
            .whatever_context("No native pixel data found for frame")?;

        let nr_segments = samples_per_pixel * bytes_per_sample;
        ensure_whatever!(
            nr_segments <= 15,
            "Too many RLE segments required: {} (max 15)",
            nr_segments
        );

        // split the pixel-interleaved, little-endian frame into one
        // byte-plane per (sample, byte position), MSB-first within each
        // sample, mirroring the layout produced by `read_rle_header`.
        let mut planes: Vec<Vec<u8>> = vec![Vec::with_capacity(npixels); nr_segments];
        for pixel in 0..npixels {
            for sample_number in 0..samples_per_pixel {
                for byte_offset in (0..bytes_per_sample).rev() {
                    let plane_index = sample_number * bytes_per_sample + byte_offset;
                    let src_index = if samples_per_pixel == 3 {
                        pixel * bytes_per_sample * samples_per_pixel
                            + sample_number * bytes_per_sample
                            + byte_offset
                    } else {
                        pixel * bytes_per_sample * samples_per_pixel + sample_number * bytes_per_sample
                            + samples_per_pixel
                            - byte_offset
                    };
                    planes[plane_index].push(frame_data[src_index]);
                }
            }
        }

        let encoded_segments: Vec<Vec<u8>> = planes.iter().map(|plane| pack_bits_encode(plane)).collect();

        // RLE header: 1 u32 segment count, then up to 15 u32 offsets
        // (relative to the start of the header), zero-padded.
        let header_len = 64;
        let mut offset = header_len as u32;
        let mut offsets = Vec::with_capacity(15);
        for segment in &encoded_segments {
            offsets.push(offset);
            offset += segment.len() as u32;
        }
        while offsets.len() < 15 {
            offsets.push(0);
        }

        dst.write_u32::<LittleEndian>(nr_segments as u32)
            .whatever_context("Failed to write RLE segment count")?;
        for o in offsets {
            dst.write_u32::<LittleEndian>(o)
                .whatever_context("Failed to write RLE segment offset")?;
        }
        for segment in encoded_segments {
            dst.write_all(&segment)
                .whatever_context("Failed to write RLE segment data")?;
        }

        Ok(Vec::new())
    }
}

/// PackBits-encode a byte plane using maximal literal/replicate runs.
///
/// This never emits the `-128` no-op byte and always produces a valid
/// decode under [`PackBitsReader`].
fn pack_bits_encode(plane: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(plane.len() + plane.len() / 64 + 1);
    let mut i = 0;
    while i < plane.len() {
        // look for a run of identical bytes
        let mut run_len = 1;
        while i + run_len < plane.len() && plane[i + run_len] == plane[i] && run_len < 128 {
            run_len += 1;
        }
        if run_len >= 2 {
            out.push((1 - run_len as i32) as i8 as u8);
            out.push(plane[i]);
            i += run_len;
            continue;
        }
        // accumulate a literal run until the next replicate run of >= 2
        let start = i;
        let mut len = 1;
        while start + len < plane.len() && len < 128 {
            let rest = &plain_run(plane, start + len);
            if *rest >= 2 {
                break;
            }
            len += 1;
        }
        out.push((len as i32 - 1) as i8 as u8);
        out.extend_from_slice(&plane[start..start + len]);
        i = start + len;
    }
    out
}

/// Length of the run of identical bytes starting at `at`, capped at 2 (only
/// used to decide whether a literal run should stop).
fn plain_run(plane: &[u8], at: usize) -> usize {
    if at >= plane.len() {
        return 0;
    }
    let mut n = 1;
    while at + n < plane.len() && plane[at + n] == plane[at] && n < 2 {
        n += 1;
    }
    n
}

// Read the RLE header and return the offsets
fn read_rle_header(fragment: &[u8]) -> Vec<u32> {
    let nr_segments = LittleEndian::read_u32(&fragment[0..4]);
    let mut offsets = vec![0; nr_segments as usize];
    LittleEndian::read_u32_into(&fragment[4..4 * (nr_segments + 1) as usize], &mut offsets);
    offsets
}

/// PackBits Reader from the image-tiff crate
/// Copyright 2018-2021 PistonDevelopers.
/// License: <https://github.com/image-rs/image-tiff/blob/master/LICENSE>
/// From: https://github.com/image-rs/image-tiff/blob/master/src/decoder/stream.rs
#[derive(Debug)]
struct PackBitsReader {
    buffer: io::Cursor<Vec<u8>>,
}

impl PackBitsReader {
    /// Wraps a reader
    pub fn new<R: Read + Seek>(
        mut reader: R,
        length: usize,
    ) -> io::Result<(usize, PackBitsReader)> {
        let mut buffer = Vec::new();
        let mut header: [u8; 1] = [0];
        let mut data: [u8; 1] = [0];

        let mut bytes_read = 0;
        while bytes_read < length {
            reader.read_exact(&mut header)?;
            bytes_read += 1;

            let h = header[0] as i8;
            if (-127..=-1).contains(&h) {
                let new_len = buffer.len() + (1 - h as isize) as usize;
                reader.read_exact(&mut data)?;
                buffer.resize(new_len, data[0]);
                bytes_read += 1;
            } else if h >= 0 {
                let num_vals = h as usize + 1;
                io::copy(&mut reader.by_ref().take(num_vals as u64), &mut buffer)?;
                bytes_read += num_vals;
            } else {
                // h = -128 is a no-op.
            }
        }

        Ok((
            buffer.len(),
            PackBitsReader {
                buffer: io::Cursor::new(buffer),
            },
        ))
    }
}

impl Read for PackBitsReader {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.read(buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_packbits() {
        let encoded = vec![
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let encoded_len = encoded.len();

        let buff = io::Cursor::new(encoded);
        let (_, mut decoder) = PackBitsReader::new(buff, encoded_len).unwrap();

        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).unwrap();

        let expected = vec![
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        assert_eq!(decoded, expected);
    }
}
