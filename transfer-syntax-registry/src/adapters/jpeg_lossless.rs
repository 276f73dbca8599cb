//! Native support for JPEG Lossless, Non-Hierarchical image decoding and
//! encoding (ITU-T T.81 Annex H, Process 14).
//!
//! Unlike [`jpeg`](super::jpeg), which delegates to `jpeg-decoder` /
//! `jpeg-encoder` for the lossy DCT-based processes, this module implements
//! the lossless predictive codec directly: there is no general-purpose Rust
//! crate for Process 14, and the DICOM transfer syntaxes
//! `1.2.840.10008.1.2.4.57` and `1.2.840.10008.1.2.4.70` require it.
//!
//! See <https://www.itu.int/rec/T-REC-T.81>, Annex H.
use dicom_core::ops::AttributeOp;
use dicom_encoding::adapters::{
    encode_error, DecodeResult, EncodeOptions, EncodeResult, PixelDataObject, PixelDataReader,
    PixelDataWriter,
};
use dicom_encoding::snafu::prelude::*;
use dicom_encoding::{submit_transfer_syntax, Codec, NeverAdapter, TransferSyntax};

/// Pixel data adapter for JPEG Lossless, Non-Hierarchical
/// (Process 14 and Process 14 Selection Value 1).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JpegLosslessAdapter;

// upgrade the two JPEG Lossless stubs in `entries` with a real codec
// whenever this module is compiled in. Both transfer syntaxes describe the
// same bitstream (Process 14, Selection Value 1); the "first order
// prediction" UID is the one actually produced by most implementations.
submit_transfer_syntax! {
    TransferSyntax::<NeverAdapter, _, _>::new_ele(
        "1.2.840.10008.1.2.4.57",
        "JPEG Lossless, Non-Hierarchical (Process 14)",
        Codec::EncapsulatedPixelData(Some(JpegLosslessAdapter), Some(JpegLosslessAdapter)),
    )
}
submit_transfer_syntax! {
    TransferSyntax::<NeverAdapter, _, _>::new_ele(
        "1.2.840.10008.1.2.4.70",
        "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
        Codec::EncapsulatedPixelData(Some(JpegLosslessAdapter), Some(JpegLosslessAdapter)),
    )
}

impl PixelDataReader for JpegLosslessAdapter {
    fn decode_frame(
        &self,
        src: &dyn PixelDataObject,
        frame: u32,
        dst: &mut Vec<u8>,
    ) -> DecodeResult<()> {
        let raw = src
            .raw_pixel_data()
            .whatever_context("Expected to have raw pixel data available")?;
        let fragment = raw
            .fragments
            .get(frame as usize)
            .whatever_context("Missing fragment for the frame requested")?;

        let image = decode_image(fragment).whatever_context("JPEG Lossless decoder failure")?;

        dst.extend_from_slice(&image.into_bytes());
        Ok(())
    }
}

impl PixelDataWriter for JpegLosslessAdapter {
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
        let bits_stored = src.bits_stored().unwrap_or(bits_allocated);

        ensure_whatever!(
            bits_allocated == 8 || bits_allocated == 16,
            "BitsAllocated other than 8 or 16 is not supported"
        );

        let frame_data = src
            .fragment(frame as usize)
            .whatever_context("No native pixel data found for frame")?;

        let image = RasterImage::from_bytes(
            &frame_data,
            rows as usize,
            cols as usize,
            samples_per_pixel as usize,
            bits_allocated as usize,
            bits_stored as u32,
        );

        let encoded = encode_image(&image);
        dst.extend_from_slice(&encoded);

        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------
// raster image model
// ---------------------------------------------------------------------

struct RasterImage {
    rows: usize,
    cols: usize,
    components: usize,
    precision: u32,
    bytes_per_sample: usize,
    /// sample planes, `[component][row * cols + col]`
    planes: Vec<Vec<i32>>,
}

impl RasterImage {
    fn from_bytes(
        data: &[u8],
        rows: usize,
        cols: usize,
        components: usize,
        bits_allocated: usize,
        precision: u32,
    ) -> RasterImage {
        let bytes_per_sample = bits_allocated / 8;
        let mut planes = vec![vec![0i32; rows * cols]; components];
        let mut offset = 0;
        for p in 0..(rows * cols) {
            for c in 0..components {
                let v = if bytes_per_sample == 1 {
                    data[offset] as i32
                } else {
                    (data[offset] as i32) | ((data[offset + 1] as i32) << 8)
                };
                planes[c][p] = v;
                offset += bytes_per_sample;
            }
        }
        RasterImage {
            rows,
            cols,
            components,
            precision,
            bytes_per_sample,
            planes,
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.rows * self.cols * self.components * self.bytes_per_sample);
        for p in 0..(self.rows * self.cols) {
            for c in 0..self.components {
                let v = self.planes[c][p];
                out.push((v & 0xFF) as u8);
                if self.bytes_per_sample == 2 {
                    out.push(((v >> 8) & 0xFF) as u8);
                }
            }
        }
        out
    }
}

#[derive(Debug, Snafu)]
enum CodecError {
    #[snafu(display("truncated JPEG stream at offset {offset}"))]
    Truncated { offset: usize },
    #[snafu(display("expected SOI marker at the start of the stream"))]
    MissingSoi,
    #[snafu(display("unsupported JPEG marker 0x{marker:02X} in a lossless stream"))]
    UnsupportedMarker { marker: u8 },
    #[snafu(display("no SOF3 (lossless) frame header found before SOS"))]
    MissingFrameHeader,
    #[snafu(display("Huffman decoding ran out of bits"))]
    BitstreamUnderflow,
    #[snafu(display("invalid Huffman code in entropy-coded segment"))]
    InvalidHuffmanCode,
}

type CodecResult<T> = Result<T, CodecError>;

// ---------------------------------------------------------------------
// marker-segment parsing (SOI, DHT, SOF3, SOS)
// ---------------------------------------------------------------------

const MARKER_SOI: u8 = 0xD8;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOF3: u8 = 0xC3;
const MARKER_DHT: u8 = 0xC4;
const MARKER_SOS: u8 = 0xDA;
const MARKER_DRI: u8 = 0xDD;

struct FrameHeader {
    precision: u32,
    rows: usize,
    cols: usize,
    component_ids: Vec<u8>,
}

struct ScanHeader {
    component_selectors: Vec<u8>,
    table_selectors: Vec<u8>,
    predictor: u8,
    point_transform: u32,
}

fn decode_image(data: &[u8]) -> CodecResult<RasterImage> {
    let mut pos = 0usize;
    ensure!(data.len() >= 2 && data[0] == 0xFF && data[1] == MARKER_SOI, MissingSoiSnafu);
    pos += 2;

    let mut huff_tables: [Option<HuffTable>; 4] = [None, None, None, None];
    let mut frame: Option<FrameHeader> = None;
    let mut restart_interval = 0usize;

    loop {
        ensure!(pos + 2 <= data.len(), TruncatedSnafu { offset: pos });
        ensure!(data[pos] == 0xFF, TruncatedSnafu { offset: pos });
        let marker = data[pos + 1];
        pos += 2;
        match marker {
            MARKER_EOI => break,
            MARKER_SOF3 => {
                let (hdr, next) = parse_sof(data, pos)?;
                frame = Some(hdr);
                pos = next;
            }
            MARKER_DHT => {
                pos = parse_dht(data, pos, &mut huff_tables)?;
            }
            MARKER_DRI => {
                let len = be16(data, pos)? as usize;
                restart_interval = be16(data, pos + 2)? as usize;
                pos += len;
            }
            MARKER_SOS => {
                let (scan, next) = parse_sos(data, pos)?;
                let frame = frame.as_ref().context(MissingFrameHeaderSnafu)?;
                let image = decode_entropy_segment(
                    data,
                    next,
                    frame,
                    &scan,
                    &huff_tables,
                    restart_interval,
                )?;
                return Ok(image);
            }
            0x01 | 0xD0..=0xD7 => {
                // TEM / RSTn outside of entropy-coded data: no payload
            }
            _ => {
                // any other marker segment (APPn, COM, DQT, other SOFn, ...)
                // carries a standard 2-byte length we can skip over.
                let len = be16(data, pos)? as usize;
                ensure!(pos + len <= data.len(), TruncatedSnafu { offset: pos });
                pos += len;
            }
        }
    }
    UnsupportedMarkerSnafu { marker: 0 }.fail()
}

fn be16(data: &[u8], pos: usize) -> CodecResult<u16> {
    ensure!(pos + 2 <= data.len(), TruncatedSnafu { offset: pos });
    Ok(u16::from_be_bytes([data[pos], data[pos + 1]]))
}

fn parse_sof(data: &[u8], pos: usize) -> CodecResult<(FrameHeader, usize)> {
    let len = be16(data, pos)? as usize;
    ensure!(pos + len <= data.len(), TruncatedSnafu { offset: pos });
    let precision = data[pos + 2] as u32;
    let rows = be16(data, pos + 3)? as usize;
    let cols = be16(data, pos + 5)? as usize;
    let n = data[pos + 7] as usize;
    let mut component_ids = Vec::with_capacity(n);
    for i in 0..n {
        let base = pos + 8 + i * 3;
        component_ids.push(data[base]);
    }
    Ok((
        FrameHeader {
            precision,
            rows,
            cols,
            component_ids,
        },
        pos + len,
    ))
}

fn parse_dht(data: &[u8], pos: usize, tables: &mut [Option<HuffTable>; 4]) -> CodecResult<usize> {
    let len = be16(data, pos)? as usize;
    ensure!(pos + len <= data.len(), TruncatedSnafu { offset: pos });
    let end = pos + len;
    let mut p = pos + 2;
    while p < end {
        let table_class_and_id = data[p];
        let id = (table_class_and_id & 0x0F) as usize;
        p += 1;
        let mut bits = [0u8; 16];
        bits.copy_from_slice(&data[p..p + 16]);
        p += 16;
        let total: usize = bits.iter().map(|&b| b as usize).sum();
        let huffval = data[p..p + total].to_vec();
        p += total;
        if id < 4 {
            tables[id] = Some(HuffTable::build(&bits, huffval));
        }
    }
    Ok(end)
}

fn parse_sos(data: &[u8], pos: usize) -> CodecResult<(ScanHeader, usize)> {
    let len = be16(data, pos)? as usize;
    ensure!(pos + len <= data.len(), TruncatedSnafu { offset: pos });
    let ns = data[pos + 2] as usize;
    let mut component_selectors = Vec::with_capacity(ns);
    let mut table_selectors = Vec::with_capacity(ns);
    for i in 0..ns {
        let base = pos + 3 + i * 2;
        component_selectors.push(data[base]);
        table_selectors.push(data[base + 1] >> 4);
    }
    let tail = pos + 3 + ns * 2;
    let predictor = data[tail];
    let point_transform = (data[tail + 2] & 0x0F) as u32;
    Ok((
        ScanHeader {
            component_selectors,
            table_selectors,
            predictor,
            point_transform,
        },
        pos + len,
    ))
}

// ---------------------------------------------------------------------
// Huffman table (ITU-T T.81 Annex C / Annex F.2.2.3)
// ---------------------------------------------------------------------

struct HuffTable {
    mincode: [i32; 17],
    maxcode: [i32; 17],
    valptr: [i32; 17],
    huffval: Vec<u8>,
}

impl HuffTable {
    fn build(bits: &[u8; 16], huffval: Vec<u8>) -> HuffTable {
        let mut huffsize = Vec::new();
        for (i, &count) in bits.iter().enumerate() {
            let len = (i + 1) as u8;
            for _ in 0..count {
                huffsize.push(len);
            }
        }

        let mut huffcode = vec![0u32; huffsize.len()];
        let mut code = 0u32;
        let mut size_index = 0;
        while size_index < huffsize.len() {
            let si = huffsize[size_index];
            while size_index < huffsize.len() && huffsize[size_index] == si {
                huffcode[size_index] = code;
                code += 1;
                size_index += 1;
            }
            code <<= 1;
        }

        let mut mincode = [0i32; 17];
        let mut maxcode = [-1i32; 17];
        let mut valptr = [0i32; 17];
        let mut p = 0usize;
        for l in 1..=16usize {
            if bits[l - 1] != 0 {
                valptr[l] = p as i32;
                mincode[l] = huffcode[p] as i32;
                p += bits[l - 1] as usize;
                maxcode[l] = huffcode[p - 1] as i32;
            } else {
                maxcode[l] = -1;
            }
        }

        HuffTable {
            mincode,
            maxcode,
            valptr,
            huffval,
        }
    }

    /// Build the canonical bit-length table and value list from observed
    /// symbol frequencies, for use when encoding.
    fn from_frequencies(freq: &[usize; 17]) -> (Box<[u8; 16]>, Vec<u8>, HuffTable) {
        #[derive(Clone)]
        struct Node {
            freq: usize,
            // leaf symbol, or children indices into the arena
            symbol: Option<u8>,
            left: Option<usize>,
            right: Option<usize>,
        }

        let mut arena: Vec<Node> = Vec::new();
        let mut active: Vec<usize> = Vec::new();
        for (symbol, &f) in freq.iter().enumerate() {
            // always include every symbol at least once so the table is
            // usable even for a single-sample image
            let f = f.max(1);
            arena.push(Node {
                freq: f,
                symbol: Some(symbol as u8),
                left: None,
                right: None,
            });
            active.push(arena.len() - 1);
        }

        while active.len() > 1 {
            active.sort_by_key(|&i| arena[i].freq);
            let a = active.remove(0);
            let b = active.remove(0);
            let combined = Node {
                freq: arena[a].freq + arena[b].freq,
                symbol: None,
                left: Some(a),
                right: Some(b),
            };
            arena.push(combined);
            active.push(arena.len() - 1);
        }

        let root = active[0];
        let mut depths = vec![0u8; arena.len()];
        fn walk(arena: &[Node], node: usize, depth: u8, depths: &mut Vec<u8>, out: &mut Vec<(u8, u8)>) {
            let n = &arena[node];
            match (n.left, n.right) {
                (Some(l), Some(r)) => {
                    walk(arena, l, depth + 1, depths, out);
                    walk(arena, r, depth + 1, depths, out);
                }
                _ => {
                    let d = depth.max(1).min(16);
                    depths[node] = d;
                    out.push((d, n.symbol.unwrap()));
                }
            }
        }
        let mut leaves = Vec::new();
        walk(&arena, root, 0, &mut depths, &mut leaves);
        leaves.sort();

        let mut bits = [0u8; 16];
        for &(depth, _) in &leaves {
            bits[(depth - 1) as usize] += 1;
        }
        let huffval: Vec<u8> = leaves.iter().map(|&(_, s)| s).collect();

        let table = HuffTable::build(&bits, huffval.clone());
        (Box::new(bits), huffval, table)
    }

    fn decode(&self, reader: &mut BitReader<'_>) -> CodecResult<u8> {
        let mut code = reader.read_bit()? as i32;
        let mut l = 1usize;
        while l <= 16 && (self.maxcode[l] == -1 || code > self.maxcode[l]) {
            code = (code << 1) | reader.read_bit()? as i32;
            l += 1;
        }
        ensure!(l <= 16, InvalidHuffmanCodeSnafu);
        let idx = (self.valptr[l] + (code - self.mincode[l])) as usize;
        self.huffval.get(idx).copied().context(InvalidHuffmanCodeSnafu)
    }
}

/// Build a code table for a category symbol: `code -> (length, bits)`.
fn huffman_codes_for(bits: &[u8; 16], huffval: &[u8]) -> std::collections::HashMap<u8, (u8, u16)> {
    let mut huffsize = Vec::new();
    for (i, &count) in bits.iter().enumerate() {
        let len = (i + 1) as u8;
        for _ in 0..count {
            huffsize.push(len);
        }
    }
    let mut codes = std::collections::HashMap::new();
    let mut code = 0u32;
    let mut size_index = 0;
    while size_index < huffsize.len() {
        let si = huffsize[size_index];
        while size_index < huffsize.len() && huffsize[size_index] == si {
            codes.insert(huffval[size_index], (si, code as u16));
            code += 1;
            size_index += 1;
        }
        code <<= 1;
    }
    codes
}

// ---------------------------------------------------------------------
// bit-level I/O with byte stuffing
// ---------------------------------------------------------------------

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buffer: u32,
    bit_count: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8], pos: usize) -> BitReader<'a> {
        BitReader {
            data,
            pos,
            bit_buffer: 0,
            bit_count: 0,
        }
    }

    fn fill(&mut self) -> CodecResult<()> {
        ensure!(self.pos < self.data.len(), BitstreamUnderflowSnafu);
        let byte = self.data[self.pos];
        self.pos += 1;
        if byte == 0xFF {
            // byte stuffing: 0xFF 0x00 is a literal 0xFF; any other
            // following byte is a marker, which must not appear inside an
            // entropy-coded segment the decoder still expects data from.
            ensure!(self.pos < self.data.len(), BitstreamUnderflowSnafu);
            if self.data[self.pos] == 0x00 {
                self.pos += 1;
            } else {
                return BitstreamUnderflowSnafu.fail();
            }
        }
        self.bit_buffer = (self.bit_buffer << 8) | byte as u32;
        self.bit_count += 8;
        Ok(())
    }

    fn read_bit(&mut self) -> CodecResult<u32> {
        if self.bit_count == 0 {
            self.fill()?;
        }
        self.bit_count -= 1;
        Ok((self.bit_buffer >> self.bit_count) & 1)
    }

    fn read_bits(&mut self, n: u32) -> CodecResult<u32> {
        let mut v = 0u32;
        for _ in 0..n {
            v = (v << 1) | self.read_bit()?;
        }
        Ok(v)
    }

    /// Position of the next unconsumed byte, rounded to a byte boundary.
    fn byte_pos(&self) -> usize {
        self.pos
    }
}

struct BitWriter {
    out: Vec<u8>,
    bit_buffer: u32,
    bit_count: u32,
}

impl BitWriter {
    fn new() -> BitWriter {
        BitWriter {
            out: Vec::new(),
            bit_buffer: 0,
            bit_count: 0,
        }
    }

    fn write_bits(&mut self, value: u32, n: u8) {
        for i in (0..n).rev() {
            let bit = (value >> i) & 1;
            self.bit_buffer = (self.bit_buffer << 1) | bit;
            self.bit_count += 1;
            if self.bit_count == 8 {
                let byte = self.bit_buffer as u8;
                self.out.push(byte);
                if byte == 0xFF {
                    self.out.push(0x00);
                }
                self.bit_buffer = 0;
                self.bit_count = 0;
            }
        }
    }

    fn flush(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            // pad with 1 bits, matching common encoder practice
            let pad = 8 - self.bit_count;
            self.bit_buffer = (self.bit_buffer << pad) | ((1u32 << pad) - 1);
            let byte = self.bit_buffer as u8;
            self.out.push(byte);
            if byte == 0xFF {
                self.out.push(0x00);
            }
        }
        self.out
    }
}

// ---------------------------------------------------------------------
// SSSS category / VLI magnitude coding (Annex F.1.2.1)
// ---------------------------------------------------------------------

fn category_of(diff: i32) -> u8 {
    let mut magnitude = diff.unsigned_abs();
    let mut ssss = 0u8;
    while magnitude > 0 {
        ssss += 1;
        magnitude >>= 1;
    }
    ssss
}

fn extend(value: u32, ssss: u8) -> i32 {
    if ssss == 0 {
        return 0;
    }
    let vt = 1i32 << (ssss - 1);
    let value = value as i32;
    if value < vt {
        value - (1 << ssss) + 1
    } else {
        value
    }
}

fn vli_bits(diff: i32, ssss: u8) -> u32 {
    if ssss == 0 {
        return 0;
    }
    if diff >= 0 {
        diff as u32
    } else {
        (diff + (1 << ssss) - 1) as u32
    }
}

// ---------------------------------------------------------------------
// predictor (Table H.1)
// ---------------------------------------------------------------------

fn predict(selector: u8, a: i32, b: i32, c: i32) -> i32 {
    match selector {
        0 => 0,
        1 => a,
        2 => b,
        3 => c,
        4 => a + b - c,
        5 => a + ((b - c) >> 1),
        6 => b + ((a - c) >> 1),
        7 => (a + b) / 2,
        _ => a,
    }
}

// ---------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------

fn decode_entropy_segment(
    data: &[u8],
    pos: usize,
    frame: &FrameHeader,
    scan: &ScanHeader,
    tables: &[Option<HuffTable>; 4],
    restart_interval: usize,
) -> CodecResult<RasterImage> {
    let rows = frame.rows;
    let cols = frame.cols;
    let components = frame.component_ids.len();
    let precision = frame.precision;
    let pt = scan.point_transform;
    let predictor = scan.predictor;
    let initial = 1i32 << (precision as i32 - pt as i32 - 1);

    let mut planes = vec![vec![0i32; rows * cols]; components];
    let table_for_component: Vec<&HuffTable> = scan
        .table_selectors
        .iter()
        .map(|&id| {
            tables[id as usize]
                .as_ref()
                .expect("DHT table referenced by SOS must have been defined")
        })
        .collect();

    let mut reader = BitReader::new(data, pos);
    let mut since_restart = 0usize;

    for row in 0..rows {
        for col in 0..cols {
            if restart_interval != 0 && since_restart == restart_interval && (row, col) != (0, 0) {
                // skip the RSTn marker (FFD0-FFD7) at this byte-aligned
                // boundary, then reset the bit reader for the new segment.
                let mut at = reader.byte_pos();
                if at + 1 < data.len() && data[at] == 0xFF && (0xD0..=0xD7).contains(&data[at + 1]) {
                    at += 2;
                }
                reader = BitReader::new(data, at);
                since_restart = 0;
            }
            for comp in 0..components {
                let a = if col > 0 {
                    planes[comp][row * cols + col - 1]
                } else if row > 0 {
                    planes[comp][(row - 1) * cols + col]
                } else {
                    initial
                };
                let b = if row > 0 {
                    planes[comp][(row - 1) * cols + col]
                } else {
                    initial
                };
                let c = if row > 0 && col > 0 {
                    planes[comp][(row - 1) * cols + col - 1]
                } else {
                    initial
                };

                let px = if row == 0 && col == 0 {
                    initial
                } else if row == 0 {
                    a
                } else if col == 0 {
                    b
                } else {
                    predict(predictor, a, b, c)
                };

                let ssss = table_for_component[comp].decode(&mut reader)?;
                let diff = if ssss == 0 {
                    0
                } else {
                    let v = reader.read_bits(ssss as u32)?;
                    extend(v, ssss)
                };

                let max_val = (1i32 << precision) - 1;
                let mut sample = (px + diff).clamp(0, max_val);
                if pt != 0 {
                    sample <<= pt;
                }
                planes[comp][row * cols + col] = sample;
            }
            since_restart += 1;
        }
    }

    Ok(RasterImage {
        rows,
        cols,
        components,
        precision,
        bytes_per_sample: if precision > 8 { 2 } else { 1 },
        planes,
    })
}

// ---------------------------------------------------------------------
// encode (always uses predictor 1, matching "First-Order Prediction",
// Selection Value 1 -- the transfer syntax this adapter primarily serves)
// ---------------------------------------------------------------------

fn encode_image(image: &RasterImage) -> Vec<u8> {
    const PREDICTOR: u8 = 1;
    let rows = image.rows;
    let cols = image.cols;
    let components = image.components;
    let precision = image.precision.max(2);
    let initial = 1i32 << (precision as i32 - 1);

    // first pass: compute SSSS category histogram across every component,
    // sharing one Huffman table (table id 0) for simplicity.
    let mut freq = [0usize; 17];
    let mut diffs = vec![Vec::with_capacity(rows * cols); components];
    for comp in 0..components {
        let plane = &image.planes[comp];
        for row in 0..rows {
            for col in 0..cols {
                let a = if col > 0 {
                    plane[row * cols + col - 1]
                } else if row > 0 {
                    plane[(row - 1) * cols + col]
                } else {
                    initial
                };
                let b = if row > 0 { plane[(row - 1) * cols + col] } else { initial };

                let px = if row == 0 && col == 0 {
                    initial
                } else if row == 0 {
                    a
                } else if col == 0 {
                    b
                } else {
                    predict(PREDICTOR, a, b, 0)
                };

                let diff = plane[row * cols + col] - px;
                let ssss = category_of(diff);
                freq[ssss as usize] += 1;
                diffs[comp].push((ssss, diff));
            }
        }
    }

    let (bits, huffval, _table) = HuffTable::from_frequencies(&freq);
    let codes = huffman_codes_for(&bits, &huffval);

    let mut out = Vec::new();
    out.extend_from_slice(&[0xFF, MARKER_SOI]);

    // SOF3
    let mut sof = Vec::new();
    sof.push(precision as u8);
    sof.extend_from_slice(&(rows as u16).to_be_bytes());
    sof.extend_from_slice(&(cols as u16).to_be_bytes());
    sof.push(components as u8);
    for c in 0..components {
        sof.push((c + 1) as u8); // component id
        sof.push(0x11); // sampling factors (1x1, no subsampling in lossless)
        sof.push(0); // quantization table id, unused
    }
    write_marker_segment(&mut out, MARKER_SOF3, &sof);

    // DHT
    let mut dht = Vec::new();
    dht.push(0x00); // table class 0 (DC/lossless), id 0
    dht.extend_from_slice(&*bits);
    dht.extend_from_slice(&huffval);
    write_marker_segment(&mut out, MARKER_DHT, &dht);

    // SOS
    let mut sos = Vec::new();
    sos.push(components as u8);
    for c in 0..components {
        sos.push((c + 1) as u8);
        sos.push(0x00); // table selector 0 for both DC/AC nibble (AC unused)
    }
    sos.push(PREDICTOR); // Ss = predictor selector
    sos.push(0); // Se, unused in lossless
    sos.push(0); // Ah/Al = 0 (no point transform)
    write_marker_segment(&mut out, MARKER_SOS, &sos);

    let mut writer = BitWriter::new();
    for row in 0..rows {
        for col in 0..cols {
            for comp in 0..components {
                let (ssss, diff) = diffs[comp][row * cols + col];
                let (len, code) = codes[&ssss];
                writer.write_bits(code as u32, len);
                if ssss > 0 {
                    writer.write_bits(vli_bits(diff, ssss), ssss);
                }
            }
        }
    }
    out.extend_from_slice(&writer.flush());

    out.extend_from_slice(&[0xFF, MARKER_EOI]);
    out
}

fn write_marker_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    out.push(0xFF);
    out.push(marker);
    let len = (payload.len() + 2) as u16;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_image(rows: usize, cols: usize, components: usize, precision: u32, fill: impl Fn(usize, usize, usize) -> i32) -> RasterImage {
        let mut planes = vec![vec![0i32; rows * cols]; components];
        for row in 0..rows {
            for col in 0..cols {
                for c in 0..components {
                    planes[c][row * cols + col] = fill(row, col, c);
                }
            }
        }
        RasterImage {
            rows,
            cols,
            components,
            precision,
            bytes_per_sample: if precision > 8 { 2 } else { 1 },
            planes,
        }
    }

    #[test]
    fn round_trip_8bit_single_component() {
        let image = make_image(4, 4, 1, 8, |row, col, _| ((row * 4 + col) * 7 % 251) as i32);
        let encoded = encode_image(&image);
        let decoded = decode_image(&encoded).expect("decode should succeed");
        assert_eq!(decoded.rows, image.rows);
        assert_eq!(decoded.cols, image.cols);
        assert_eq!(decoded.planes, image.planes);
    }

    #[test]
    fn round_trip_16bit_three_components_gradient() {
        let image = make_image(8, 6, 3, 12, |row, col, c| {
            ((row * 37 + col * 11 + c * 5) % 4096) as i32
        });
        let encoded = encode_image(&image);
        let decoded = decode_image(&encoded).expect("decode should succeed");
        assert_eq!(decoded.planes, image.planes);
    }

    #[test]
    fn round_trip_flat_image() {
        // degenerate case: every sample identical, category 0 throughout
        let image = make_image(3, 3, 1, 8, |_, _, _| 42);
        let encoded = encode_image(&image);
        let decoded = decode_image(&encoded).expect("decode should succeed");
        assert_eq!(decoded.planes, image.planes);
    }

    #[test]
    fn category_and_extend_are_inverse() {
        for diff in -200i32..=200 {
            let ssss = category_of(diff);
            let bits = vli_bits(diff, ssss);
            assert_eq!(extend(bits, ssss), diff, "diff={diff} ssss={ssss}");
        }
    }
}
