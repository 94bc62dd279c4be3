//! JPEG decoder for baseline and progressive DCT streams.
//!
//! The decoder walks the segment stream with a flat match on each
//! marker byte, accumulates quantized coefficients per component across
//! scans, and materializes pixels once EOI is reached: dequantize,
//! inverse DCT, scatter into component planes, upsample and color
//! convert.
//!
//! Reference: ITU-T T.81 Sections B (syntax), F.2 (sequential decode)
//! and G.2 (progressive decode).

use log::{debug, trace};

use crate::color::ycbcr_to_rgb;
use crate::consts::{
    DCTSIZE, DCTSIZE2, JPEG_APP0, JPEG_COM, JPEG_DHT, JPEG_DQT, JPEG_DRI, JPEG_EOI,
    JPEG_NATURAL_ORDER, JPEG_SOF0, JPEG_SOF1, JPEG_SOF2, JPEG_SOI, JPEG_SOS, MAX_COMPS_IN_SCAN,
};
use crate::error::{Error, Result};
use crate::image::Image;
use crate::jpeg::bitread::BitReader;
use crate::jpeg::dct::inverse_dct_8x8;
use crate::jpeg::huffman::{HuffDecoder, HuffSpec};
use crate::jpeg::quant::QuantTable;

/// One frame component with its coefficient storage.
struct Component {
    id: u8,
    h_samp: usize,
    v_samp: usize,
    quant_idx: usize,
    /// Block columns allocated per row (padded to a whole MCU).
    blocks_per_row: usize,
    /// Block rows allocated (padded to a whole MCU).
    block_rows: usize,
    /// Block columns covering the component's actual pixels.
    nat_blocks_w: usize,
    /// Block rows covering the component's actual pixels.
    nat_blocks_h: usize,
    /// Quantized coefficients, natural order within each block.
    coeffs: Vec<i16>,
}

/// Frame state established by SOF.
struct Frame {
    progressive: bool,
    width: usize,
    height: usize,
    h_max: usize,
    v_max: usize,
    mcus_w: usize,
    mcus_h: usize,
    components: Vec<Component>,
}

/// Scan parameters established by SOS.
struct ScanHeader {
    /// Indices into `Frame::components`, in scan order.
    comp_indices: Vec<usize>,
    dc_idx: [usize; MAX_COMPS_IN_SCAN],
    ac_idx: [usize; MAX_COMPS_IN_SCAN],
    ss: usize,
    se: usize,
    ah: u8,
    al: u8,
}

/// All mutable decode state for a single stream.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    quant_tables: [Option<QuantTable>; 4],
    dc_tables: [Option<HuffDecoder>; 4],
    ac_tables: [Option<HuffDecoder>; 4],
    restart_interval: usize,
    frame: Option<Frame>,
    scans_seen: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Decoder {
            data,
            pos: 0,
            quant_tables: [None, None, None, None],
            dc_tables: [None, None, None, None],
            ac_tables: [None, None, None, None],
            restart_interval: 0,
            frame: None,
            scans_seen: 0,
        }
    }

    /// Decode the whole stream into an RGBA image.
    pub fn decode(mut self) -> Result<Image> {
        if self.data.len() < 2 || self.data[0] != 0xFF || self.data[1] != JPEG_SOI {
            return Err(Error::BadSignature);
        }
        self.pos = 2;

        loop {
            let marker = self.next_marker()?;
            trace!("segment marker 0x{:02X} at {}", marker, self.pos);
            match marker {
                JPEG_SOF0 | JPEG_SOF1 => self.parse_sof(false)?,
                JPEG_SOF2 => self.parse_sof(true)?,
                JPEG_DHT => self.parse_dht()?,
                JPEG_DQT => self.parse_dqt()?,
                JPEG_DRI => self.parse_dri()?,
                JPEG_SOS => {
                    let scan = self.parse_sos()?;
                    self.decode_scan(&scan)?;
                }
                JPEG_EOI => {
                    debug!("EOI after {} scan(s)", self.scans_seen);
                    return self.assemble();
                }
                JPEG_COM => self.skip_segment(marker)?,
                m if (JPEG_APP0..=0xEF).contains(&m) => self.skip_segment(m)?,
                m => return Err(Error::UnexpectedMarker(m)),
            }
        }
    }

    /// Advance to the next marker, tolerating 0xFF fill bytes.
    fn next_marker(&mut self) -> Result<u8> {
        if self.pos >= self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        if self.data[self.pos] != 0xFF {
            return Err(Error::UnexpectedMarker(self.data[self.pos]));
        }
        while self.pos < self.data.len() && self.data[self.pos] == 0xFF {
            self.pos += 1;
        }
        if self.pos >= self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        let marker = self.data[self.pos];
        self.pos += 1;
        Ok(marker)
    }

    fn read_u8(&mut self) -> Result<u8> {
        if self.pos >= self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let hi = self.read_u8()? as u16;
        let lo = self.read_u8()? as u16;
        Ok((hi << 8) | lo)
    }

    /// Read a segment length and return the byte offset just past the
    /// segment payload.
    fn segment_end(&mut self, marker: u8) -> Result<usize> {
        let length = self.read_u16()?;
        if length < 2 {
            return Err(Error::BadSegmentLength { marker, length });
        }
        let end = self.pos + length as usize - 2;
        if end > self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        Ok(end)
    }

    fn skip_segment(&mut self, marker: u8) -> Result<()> {
        let end = self.segment_end(marker)?;
        self.pos = end;
        Ok(())
    }

    fn parse_sof(&mut self, progressive: bool) -> Result<()> {
        let marker = if progressive { JPEG_SOF2 } else { JPEG_SOF0 };
        let end = self.segment_end(marker)?;

        let precision = self.read_u8()?;
        if precision != 8 {
            return Err(Error::UnsupportedPrecision(precision));
        }
        let height = self.read_u16()? as usize;
        let width = self.read_u16()? as usize;
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions {
                width: width as u32,
                height: height as u32,
            });
        }

        let num_components = self.read_u8()? as usize;
        if num_components != 1 && num_components != 3 {
            return Err(Error::InvalidScanSpec {
                reason: "frame must have 1 or 3 components",
            });
        }

        let mut components = Vec::with_capacity(num_components);
        let mut h_max = 1usize;
        let mut v_max = 1usize;
        for _ in 0..num_components {
            let id = self.read_u8()?;
            if components.iter().any(|c: &Component| c.id == id) {
                return Err(Error::DuplicateComponent(id));
            }
            let samp = self.read_u8()?;
            let h = (samp >> 4) as usize;
            let v = (samp & 0x0F) as usize;
            if !matches!(h, 1 | 2 | 4) || !matches!(v, 1 | 2 | 4) {
                return Err(Error::UnsupportedSampling {
                    h: h as u8,
                    v: v as u8,
                });
            }
            let quant_idx = self.read_u8()? as usize;
            if quant_idx > 3 {
                return Err(Error::BadTableIndex(quant_idx as u8));
            }
            h_max = h_max.max(h);
            v_max = v_max.max(v);
            components.push(Component {
                id,
                h_samp: h,
                v_samp: v,
                quant_idx,
                blocks_per_row: 0,
                block_rows: 0,
                nat_blocks_w: 0,
                nat_blocks_h: 0,
                coeffs: Vec::new(),
            });
        }

        let mcus_w = width.div_ceil(DCTSIZE * h_max);
        let mcus_h = height.div_ceil(DCTSIZE * v_max);
        for comp in components.iter_mut() {
            comp.blocks_per_row = mcus_w * comp.h_samp;
            comp.block_rows = mcus_h * comp.v_samp;
            let comp_w = (width * comp.h_samp).div_ceil(h_max);
            let comp_h = (height * comp.v_samp).div_ceil(v_max);
            comp.nat_blocks_w = comp_w.div_ceil(DCTSIZE);
            comp.nat_blocks_h = comp_h.div_ceil(DCTSIZE);
            comp.coeffs = vec![0i16; comp.blocks_per_row * comp.block_rows * DCTSIZE2];
        }

        debug!(
            "SOF{}: {}x{}, {} component(s), {}x{} MCUs",
            if progressive { 2 } else { 0 },
            width,
            height,
            num_components,
            mcus_w,
            mcus_h
        );

        self.frame = Some(Frame {
            progressive,
            width,
            height,
            h_max,
            v_max,
            mcus_w,
            mcus_h,
            components,
        });
        self.pos = end;
        Ok(())
    }

    fn parse_dht(&mut self) -> Result<()> {
        let end = self.segment_end(JPEG_DHT)?;
        while self.pos < end {
            let tc_th = self.read_u8()?;
            let class = tc_th >> 4;
            let index = (tc_th & 0x0F) as usize;
            if class > 1 || index > 3 {
                return Err(Error::BadTableIndex(tc_th));
            }

            let mut bits = [0u8; 17];
            let mut total = 0usize;
            for i in 1..=16 {
                bits[i] = self.read_u8()?;
                total += bits[i] as usize;
            }
            if self.pos + total > end {
                return Err(Error::UnexpectedEof);
            }
            let values = &self.data[self.pos..self.pos + total];
            self.pos += total;

            let spec = HuffSpec::new(bits, values)?;
            let table = HuffDecoder::from_spec(&spec)?;
            if class == 0 {
                self.dc_tables[index] = Some(table);
            } else {
                self.ac_tables[index] = Some(table);
            }
        }
        Ok(())
    }

    fn parse_dqt(&mut self) -> Result<()> {
        let end = self.segment_end(JPEG_DQT)?;
        while self.pos < end {
            let pq_tq = self.read_u8()?;
            let precision = pq_tq >> 4;
            let index = (pq_tq & 0x0F) as usize;
            if precision > 1 || index > 3 {
                return Err(Error::BadTableIndex(pq_tq));
            }
            let mut zigzag = [0u16; DCTSIZE2];
            for entry in zigzag.iter_mut() {
                *entry = if precision == 1 {
                    self.read_u16()?
                } else {
                    self.read_u8()? as u16
                };
            }
            self.quant_tables[index] = Some(QuantTable::from_zigzag(&zigzag));
        }
        Ok(())
    }

    fn parse_dri(&mut self) -> Result<()> {
        let end = self.segment_end(JPEG_DRI)?;
        self.restart_interval = self.read_u16()? as usize;
        debug!("restart interval {}", self.restart_interval);
        self.pos = end;
        Ok(())
    }

    fn parse_sos(&mut self) -> Result<ScanHeader> {
        let end = self.segment_end(JPEG_SOS)?;
        // Snapshot what the header checks need; the reads below want
        // the cursor mutable.
        let (comp_ids, progressive) = {
            let frame = self.frame.as_ref().ok_or(Error::ScanBeforeFrame)?;
            let ids: Vec<u8> = frame.components.iter().map(|c| c.id).collect();
            (ids, frame.progressive)
        };

        let ns = self.read_u8()? as usize;
        if ns == 0 || ns > MAX_COMPS_IN_SCAN || ns > comp_ids.len() {
            return Err(Error::InvalidScanSpec {
                reason: "bad component count in scan header",
            });
        }

        let mut comp_indices = Vec::with_capacity(ns);
        let mut dc_idx = [0usize; MAX_COMPS_IN_SCAN];
        let mut ac_idx = [0usize; MAX_COMPS_IN_SCAN];
        for i in 0..ns {
            let id = self.read_u8()?;
            let ci = comp_ids
                .iter()
                .position(|&cid| cid == id)
                .ok_or(Error::UnknownComponent(id))?;
            if comp_indices.contains(&ci) {
                return Err(Error::DuplicateComponent(id));
            }
            comp_indices.push(ci);
            let tables = self.read_u8()?;
            dc_idx[i] = (tables >> 4) as usize;
            ac_idx[i] = (tables & 0x0F) as usize;
            if dc_idx[i] > 3 || ac_idx[i] > 3 {
                return Err(Error::BadTableIndex(tables));
            }
        }

        let ss = self.read_u8()? as usize;
        let se = self.read_u8()? as usize;
        let ah_al = self.read_u8()?;
        let ah = ah_al >> 4;
        let al = ah_al & 0x0F;

        if progressive {
            if ss == 0 && se != 0 {
                return Err(Error::InvalidScanSpec {
                    reason: "DC scan must have Se = 0",
                });
            }
            if ss > 0 && (se < ss || se > 63) {
                return Err(Error::InvalidScanSpec {
                    reason: "AC band out of range",
                });
            }
            if ss > 0 && ns != 1 {
                return Err(Error::InvalidScanSpec {
                    reason: "AC scans must be single-component",
                });
            }
            if ah != 0 && ah != al + 1 {
                return Err(Error::InvalidScanSpec {
                    reason: "successive approximation must refine one bit",
                });
            }
            if al > 13 {
                return Err(Error::InvalidScanSpec {
                    reason: "point transform out of range",
                });
            }
        } else if ss != 0 || se != 63 || ah != 0 || al != 0 {
            return Err(Error::InvalidScanSpec {
                reason: "baseline scan must cover the full band",
            });
        }

        self.pos = end;
        Ok(ScanHeader {
            comp_indices,
            dc_idx,
            ac_idx,
            ss,
            se,
            ah,
            al,
        })
    }

    /// Decode the entropy-coded data following one SOS header.
    fn decode_scan(&mut self, scan: &ScanHeader) -> Result<()> {
        let mut frame = self.frame.take().ok_or(Error::ScanBeforeFrame)?;
        let result = self.decode_scan_inner(&mut frame, scan);
        self.frame = Some(frame);
        self.scans_seen += 1;
        result
    }

    fn decode_scan_inner(&mut self, frame: &mut Frame, scan: &ScanHeader) -> Result<()> {
        let ns = scan.comp_indices.len();
        let progressive = frame.progressive;

        // Table requirements depend on the scan kind. DC refinement
        // reads raw bits and needs no Huffman table at all.
        let needs_dc = scan.ss == 0 && scan.ah == 0;
        let needs_ac = !progressive || scan.ss > 0;

        let mut dc_decs: Vec<Option<&HuffDecoder>> = Vec::with_capacity(ns);
        let mut ac_decs: Vec<Option<&HuffDecoder>> = Vec::with_capacity(ns);
        for i in 0..ns {
            if needs_dc {
                let idx = scan.dc_idx[i];
                let t = self.dc_tables[idx].as_ref().ok_or(Error::MissingTable {
                    index: idx as u8,
                    huffman: true,
                })?;
                dc_decs.push(Some(t));
            } else {
                dc_decs.push(None);
            }
            if needs_ac {
                let idx = scan.ac_idx[i];
                let t = self.ac_tables[idx].as_ref().ok_or(Error::MissingTable {
                    index: idx as u8,
                    huffman: true,
                })?;
                ac_decs.push(Some(t));
            } else {
                ac_decs.push(None);
            }
        }

        let mut reader = BitReader::new(self.data, self.pos);
        let mut dc_pred = [0i16; MAX_COMPS_IN_SCAN];
        let mut eobrun = 0u32;
        let mut next_rst = 0u8;
        let mut restarts_to_go = self.restart_interval;

        // Work units: MCUs when interleaved, single blocks otherwise.
        let units = if ns > 1 {
            frame.mcus_w * frame.mcus_h
        } else {
            let c = &frame.components[scan.comp_indices[0]];
            c.nat_blocks_w * c.nat_blocks_h
        };

        for unit in 0..units {
            if self.restart_interval > 0 && restarts_to_go == 0 {
                reader.restart(next_rst)?;
                next_rst = (next_rst + 1) & 0x07;
                dc_pred = [0; MAX_COMPS_IN_SCAN];
                eobrun = 0;
                restarts_to_go = self.restart_interval;
            }

            if ns > 1 {
                let mcu_x = unit % frame.mcus_w;
                let mcu_y = unit / frame.mcus_w;
                for (si, &ci) in scan.comp_indices.iter().enumerate() {
                    let comp = &mut frame.components[ci];
                    for by in 0..comp.v_samp {
                        for bx in 0..comp.h_samp {
                            let row = mcu_y * comp.v_samp + by;
                            let col = mcu_x * comp.h_samp + bx;
                            let start = (row * comp.blocks_per_row + col) * DCTSIZE2;
                            let block = &mut comp.coeffs[start..start + DCTSIZE2];
                            decode_unit(
                                &mut reader,
                                block,
                                progressive,
                                scan,
                                dc_decs[si],
                                ac_decs[si],
                                &mut dc_pred[si],
                                &mut eobrun,
                            )?;
                        }
                    }
                }
            } else {
                let comp = &mut frame.components[scan.comp_indices[0]];
                let row = unit / comp.nat_blocks_w;
                let col = unit % comp.nat_blocks_w;
                let start = (row * comp.blocks_per_row + col) * DCTSIZE2;
                let block = &mut comp.coeffs[start..start + DCTSIZE2];
                decode_unit(
                    &mut reader,
                    block,
                    progressive,
                    scan,
                    dc_decs[0],
                    ac_decs[0],
                    &mut dc_pred[0],
                    &mut eobrun,
                )?;
            }

            if self.restart_interval > 0 {
                restarts_to_go -= 1;
            }
        }

        reader.finish_scan();
        self.pos = reader.byte_position();
        Ok(())
    }

    /// Materialize the RGBA image once all scans have been read.
    fn assemble(&mut self) -> Result<Image> {
        let frame = self.frame.take().ok_or(Error::ScanBeforeFrame)?;
        if self.scans_seen == 0 {
            return Err(Error::ScanBeforeFrame);
        }

        // Dequantize and inverse-transform each component into a padded
        // sample plane.
        let mut planes: Vec<Vec<u8>> = Vec::with_capacity(frame.components.len());
        for comp in frame.components.iter() {
            let table = self.quant_tables[comp.quant_idx]
                .as_ref()
                .ok_or(Error::MissingTable {
                    index: comp.quant_idx as u8,
                    huffman: false,
                })?;

            let stride = comp.blocks_per_row * DCTSIZE;
            let mut plane = vec![0u8; stride * comp.block_rows * DCTSIZE];
            let mut dequant = [0i32; DCTSIZE2];
            let mut samples = [0u8; DCTSIZE2];

            for row in 0..comp.block_rows {
                for col in 0..comp.blocks_per_row {
                    let start = (row * comp.blocks_per_row + col) * DCTSIZE2;
                    let block = &comp.coeffs[start..start + DCTSIZE2];
                    for i in 0..DCTSIZE2 {
                        dequant[i] = table.dequantize(block[i], i);
                    }
                    inverse_dct_8x8(&dequant, &mut samples);

                    let px = col * DCTSIZE;
                    let py = row * DCTSIZE;
                    for y in 0..DCTSIZE {
                        let dst = (py + y) * stride + px;
                        plane[dst..dst + DCTSIZE]
                            .copy_from_slice(&samples[y * DCTSIZE..(y + 1) * DCTSIZE]);
                    }
                }
            }
            planes.push(plane);
        }

        // Upsample with nearest-neighbor replication and color convert.
        let mut image = Image::new(frame.width as u32, frame.height as u32)?;
        let gray = frame.components.len() == 1;
        for y in 0..frame.height {
            for x in 0..frame.width {
                let rgba = if gray {
                    let v = sample_plane(&frame, &planes, 0, x, y);
                    (v, v, v, 255)
                } else {
                    let yy = sample_plane(&frame, &planes, 0, x, y);
                    let cb = sample_plane(&frame, &planes, 1, x, y);
                    let cr = sample_plane(&frame, &planes, 2, x, y);
                    let (r, g, b) = ycbcr_to_rgb(yy, cb, cr);
                    (r, g, b, 255)
                };
                image.put_pixel(x as u32, y as u32, rgba);
            }
        }
        Ok(image)
    }
}

/// Fetch one component sample for output pixel (x, y), replicating
/// subsampled planes.
#[inline]
fn sample_plane(frame: &Frame, planes: &[Vec<u8>], ci: usize, x: usize, y: usize) -> u8 {
    let comp = &frame.components[ci];
    let sx = x * comp.h_samp / frame.h_max;
    let sy = y * comp.v_samp / frame.v_max;
    let stride = comp.blocks_per_row * DCTSIZE;
    planes[ci][sy * stride + sx]
}

/// Decode one block's worth of data for the current scan kind.
#[allow(clippy::too_many_arguments)]
fn decode_unit(
    reader: &mut BitReader<'_>,
    block: &mut [i16],
    progressive: bool,
    scan: &ScanHeader,
    dc_dec: Option<&HuffDecoder>,
    ac_dec: Option<&HuffDecoder>,
    dc_pred: &mut i16,
    eobrun: &mut u32,
) -> Result<()> {
    if !progressive {
        return decode_block_baseline(
            reader,
            block,
            dc_dec.ok_or(Error::BadHuffmanCode)?,
            ac_dec.ok_or(Error::BadHuffmanCode)?,
            dc_pred,
        );
    }
    if scan.ss == 0 {
        if scan.ah == 0 {
            decode_dc_first(reader, block, dc_dec.ok_or(Error::BadHuffmanCode)?, dc_pred, scan.al)
        } else {
            decode_dc_refine(reader, block, scan.al)
        }
    } else if scan.ah == 0 {
        decode_ac_first(
            reader,
            block,
            ac_dec.ok_or(Error::BadHuffmanCode)?,
            scan.ss,
            scan.se,
            scan.al,
            eobrun,
        )
    } else {
        decode_ac_refine(
            reader,
            block,
            ac_dec.ok_or(Error::BadHuffmanCode)?,
            scan.ss,
            scan.se,
            scan.al,
            eobrun,
        )
    }
}

/// Sequential decode of a complete block (T.81 F.2.2).
fn decode_block_baseline(
    reader: &mut BitReader<'_>,
    block: &mut [i16],
    dc_dec: &HuffDecoder,
    ac_dec: &HuffDecoder,
    dc_pred: &mut i16,
) -> Result<()> {
    let t = dc_dec.decode(reader)?;
    let diff = reader.receive_extend(t)?;
    *dc_pred = dc_pred.wrapping_add(diff as i16);
    block[0] = *dc_pred;

    let mut k = 1usize;
    while k < DCTSIZE2 {
        let symbol = ac_dec.decode(reader)?;
        let run = (symbol >> 4) as usize;
        let size = symbol & 0x0F;
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            break; // EOB
        }
        k += run;
        if k >= DCTSIZE2 {
            return Err(Error::BadHuffmanCode);
        }
        block[JPEG_NATURAL_ORDER[k]] = reader.receive_extend(size)? as i16;
        k += 1;
    }
    Ok(())
}

/// Progressive DC, first pass (G.2.2.1). Predictions run in the
/// point-transformed domain.
fn decode_dc_first(
    reader: &mut BitReader<'_>,
    block: &mut [i16],
    dc_dec: &HuffDecoder,
    dc_pred: &mut i16,
    al: u8,
) -> Result<()> {
    let t = dc_dec.decode(reader)?;
    let diff = reader.receive_extend(t)?;
    *dc_pred = dc_pred.wrapping_add(diff as i16);
    block[0] = *dc_pred << al;
    Ok(())
}

/// Progressive DC refinement: one raw bit per block.
fn decode_dc_refine(reader: &mut BitReader<'_>, block: &mut [i16], al: u8) -> Result<()> {
    if reader.read_bit()? != 0 {
        block[0] |= 1 << al;
    }
    Ok(())
}

/// Progressive AC, first pass over band Ss..=Se with EOB runs
/// (G.2.2.2).
fn decode_ac_first(
    reader: &mut BitReader<'_>,
    block: &mut [i16],
    ac_dec: &HuffDecoder,
    ss: usize,
    se: usize,
    al: u8,
    eobrun: &mut u32,
) -> Result<()> {
    if *eobrun > 0 {
        *eobrun -= 1;
        return Ok(());
    }

    let mut k = ss;
    while k <= se {
        let symbol = ac_dec.decode(reader)?;
        let run = (symbol >> 4) as usize;
        let size = symbol & 0x0F;
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            // EOBn: run of (1 << run) + extension bits blocks, this one
            // included.
            *eobrun = 1 << run;
            if run > 0 {
                *eobrun += reader.read_bits(run as u32)?;
            }
            *eobrun -= 1;
            break;
        }
        k += run;
        if k > se {
            return Err(Error::BadHuffmanCode);
        }
        block[JPEG_NATURAL_ORDER[k]] = (reader.receive_extend(size)? << al) as i16;
        k += 1;
    }
    Ok(())
}

/// Progressive AC refinement (G.2.2.3): appends one magnitude bit to
/// already-nonzero coefficients and places newly nonzero ones.
fn decode_ac_refine(
    reader: &mut BitReader<'_>,
    block: &mut [i16],
    ac_dec: &HuffDecoder,
    ss: usize,
    se: usize,
    al: u8,
    eobrun: &mut u32,
) -> Result<()> {
    let p1 = 1i16 << al;
    let m1 = -1i16 << al;

    let mut k = ss;
    if *eobrun == 0 {
        while k <= se {
            let symbol = ac_dec.decode(reader)?;
            let mut run = (symbol >> 4) as usize;
            let size = symbol & 0x0F;

            let mut newval = 0i16;
            if size != 0 {
                if size != 1 {
                    return Err(Error::BadHuffmanCode);
                }
                newval = if reader.read_bit()? != 0 { p1 } else { m1 };
            } else if run != 15 {
                *eobrun = 1 << run;
                if run > 0 {
                    *eobrun += reader.read_bits(run as u32)?;
                }
                break;
            }

            // Advance over `run` zero-history coefficients, refining
            // nonzero ones along the way.
            while k <= se {
                let idx = JPEG_NATURAL_ORDER[k];
                if block[idx] != 0 {
                    if reader.read_bit()? != 0 && (block[idx] & p1) == 0 {
                        if block[idx] >= 0 {
                            block[idx] += p1;
                        } else {
                            block[idx] += m1;
                        }
                    }
                } else {
                    if run == 0 {
                        break;
                    }
                    run -= 1;
                }
                k += 1;
            }

            if newval != 0 {
                if k > se {
                    return Err(Error::BadHuffmanCode);
                }
                block[JPEG_NATURAL_ORDER[k]] = newval;
            }
            k += 1;
        }
    }

    if *eobrun > 0 {
        // Remaining coefficients in the band still receive their
        // correction bits.
        while k <= se {
            let idx = JPEG_NATURAL_ORDER[k];
            if block[idx] != 0 && reader.read_bit()? != 0 && (block[idx] & p1) == 0 {
                if block[idx] >= 0 {
                    block[idx] += p1;
                } else {
                    block[idx] += m1;
                }
            }
            k += 1;
        }
        *eobrun -= 1;
    }
    Ok(())
}

/// Decode a complete JPEG stream from a byte slice.
pub fn decode(data: &[u8]) -> Result<Image> {
    Decoder::new(data).decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{
        AC_LUMINANCE_BITS, AC_LUMINANCE_VALUES, DC_LUMINANCE_BITS, DC_LUMINANCE_VALUES,
    };
    use crate::jpeg::bitwrite::BitWriter;
    use crate::jpeg::entropy::EntropyEncoder;
    use crate::jpeg::huffman::HuffEncoder;
    use crate::jpeg::marker::{MarkerWriter, SofComponent, SosComponent};

    /// Hand-assemble a minimal baseline grayscale stream for one block
    /// of quantized coefficients.
    fn gray_block_jpeg(block: &[i16; DCTSIZE2], quality: u8) -> Vec<u8> {
        let mut out = Vec::new();
        let mut mw = MarkerWriter::new(&mut out);
        mw.write_soi().unwrap();
        mw.write_jfif_app0(1, 72, 72).unwrap();
        let qt = QuantTable::luminance(quality).unwrap();
        mw.write_dqt(0, &qt).unwrap();
        mw.write_sof(
            false,
            8,
            8,
            &[SofComponent {
                id: 1,
                h_samp: 1,
                v_samp: 1,
                quant_idx: 0,
            }],
        )
        .unwrap();
        let dc = HuffSpec::new(DC_LUMINANCE_BITS, &DC_LUMINANCE_VALUES).unwrap();
        let ac = HuffSpec::new(AC_LUMINANCE_BITS, &AC_LUMINANCE_VALUES).unwrap();
        mw.write_dht(0, false, &dc).unwrap();
        mw.write_dht(0, true, &ac).unwrap();
        mw.write_sos(
            &[SosComponent {
                id: 1,
                dc_idx: 0,
                ac_idx: 0,
            }],
            0,
            63,
            0,
            0,
        )
        .unwrap();

        {
            let mut bw = BitWriter::new(mw.get_mut());
            let mut enc = EntropyEncoder::new(&mut bw);
            let dc_enc = HuffEncoder::from_spec(&dc).unwrap();
            let ac_enc = HuffEncoder::from_spec(&ac).unwrap();
            enc.encode_block(block, 0, &dc_enc, &ac_enc).unwrap();
            enc.flush().unwrap();
        }
        mw.write_eoi().unwrap();
        out
    }

    #[test]
    fn test_uniform_gray_block() {
        // Quality 50 luminance DC step is 16; quantized DC 4 means a
        // spatial value of 4*16/8 + 128 = 136 across the whole tile.
        let mut block = [0i16; DCTSIZE2];
        block[0] = 4;
        let data = gray_block_jpeg(&block, 50);

        let image = decode(&data).unwrap();
        assert_eq!(image.width(), 8);
        assert_eq!(image.height(), 8);
        for y in 0..8 {
            for x in 0..8 {
                let (r, g, b, a) = image.get_pixel(x, y);
                assert_eq!((r, g, b, a), (136, 136, 136, 255));
            }
        }
    }

    #[test]
    fn test_bad_signature() {
        assert!(matches!(decode(b"GIF89a"), Err(Error::BadSignature)));
        assert!(matches!(decode(&[0xFF, 0xD9]), Err(Error::BadSignature)));
    }

    #[test]
    fn test_truncated_stream() {
        let block = [0i16; DCTSIZE2];
        let data = gray_block_jpeg(&block, 50);
        let truncated = &data[..data.len() - 4];
        assert!(decode(truncated).is_err());
    }

    #[test]
    fn test_scan_before_frame_rejected() {
        // SOI directly followed by a minimal SOS header.
        let data = [
            0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00,
        ];
        assert!(matches!(decode(&data), Err(Error::ScanBeforeFrame)));
    }

    #[test]
    fn test_unknown_scan_component_rejected() {
        let mut block = [0i16; DCTSIZE2];
        block[0] = 1;
        let mut data = gray_block_jpeg(&block, 50);
        // The SOS component id byte follows the 2-byte header length and
        // the count byte; corrupt it.
        let sos_at = data.windows(2).position(|w| w == [0xFF, 0xDA]).unwrap();
        data[sos_at + 5] = 9;
        assert!(matches!(decode(&data), Err(Error::UnknownComponent(9))));
    }

    #[test]
    fn test_missing_quant_table() {
        // Same stream minus the DQT segment (length 67 + 2 marker bytes).
        let mut block = [0i16; DCTSIZE2];
        block[0] = 1;
        let data = gray_block_jpeg(&block, 50);
        let dqt_at = data.windows(2).position(|w| w == [0xFF, 0xDB]).unwrap();
        let mut stripped = data[..dqt_at].to_vec();
        stripped.extend_from_slice(&data[dqt_at + 69..]);
        assert!(matches!(
            decode(&stripped),
            Err(Error::MissingTable { huffman: false, .. })
        ));
    }

    #[test]
    fn test_gradient_roundtrip_close() {
        // Encode a horizontal ramp at quality 90 and require the decoded
        // samples to stay near the source.
        let mut pixels = [0u8; DCTSIZE2];
        for y in 0..DCTSIZE {
            for x in 0..DCTSIZE {
                pixels[y * DCTSIZE + x] = (x * 30 + 20) as u8;
            }
        }

        let qt = QuantTable::luminance(90).unwrap();
        let mut centered = [0i16; DCTSIZE2];
        for i in 0..DCTSIZE2 {
            centered[i] = pixels[i] as i16 - 128;
        }
        let mut coeffs = [0i16; DCTSIZE2];
        crate::jpeg::dct::forward_dct_8x8(&centered, &mut coeffs);
        let mut block = [0i16; DCTSIZE2];
        for i in 0..DCTSIZE2 {
            block[i] = qt.quantize(coeffs[i], i);
        }

        let data = gray_block_jpeg(&block, 90);
        let image = decode(&data).unwrap();
        for y in 0..8u32 {
            for x in 0..8u32 {
                let (r, _, _, _) = image.get_pixel(x, y);
                let want = pixels[(y * 8 + x) as usize] as i32;
                assert!(
                    (r as i32 - want).abs() <= 8,
                    "({},{}) decoded {} expected {}",
                    x,
                    y,
                    r,
                    want
                );
            }
        }
    }
}
