#![allow(dead_code)]
use mpeg2index::es::StreamId;
use mpeg2index::pes::PesHeader;
use mpeg2index::time::Timestamp;
use mpeg2index::ts::PacketFormat;
use crc::{Crc, CRC_32_MPEG_2};
use std::collections::HashMap;

const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// 720x480, 30000/1001 fps.
pub const SEQUENCE_HEADER: [u8; 12] = [
    0x00, 0x00, 0x01, 0xB3, 0x2D, 0x01, 0xE0, 0x24, 0x0E, 0xA6, 0x23, 0x80,
];
pub const SEQUENCE_END: [u8; 4] = [0x00, 0x00, 0x01, 0xB7];

pub const PICTURE_I: u8 = 1;
pub const PICTURE_P: u8 = 2;
pub const PICTURE_B: u8 = 3;

pub fn sequence_extension(progressive_sequence: bool) -> Vec<u8> {
    let b = if progressive_sequence { 0x8A } else { 0x82 };
    vec![0x00, 0x00, 0x01, 0xB5, 0x14, b, 0x00, 0x01, 0x00, 0x00]
}

pub fn gop_header(closed: bool) -> Vec<u8> {
    vec![0x00, 0x00, 0x01, 0xB8, 0x00, 0x08, 0x00, if closed { 0x40 } else { 0x00 }]
}

pub fn picture_header(temporal_reference: u16, coding_type: u8) -> Vec<u8> {
    let b1 = (temporal_reference >> 2) as u8;
    let b2 = (((temporal_reference & 0b11) as u8) << 6) | (coding_type << 3);
    let mut bytes = vec![0x00, 0x00, 0x01, 0x00, b1, b2, 0xFF, 0xF8];
    if coding_type != PICTURE_I {
        bytes.push(0x00);
    }
    bytes
}

pub fn picture_coding_extension(top_field_first: bool, repeat_first_field: bool) -> Vec<u8> {
    let b3 = ((top_field_first as u8) << 7) | ((repeat_first_field as u8) << 1) | 1;
    vec![0x00, 0x00, 0x01, 0xB5, 0x8F, 0xFF, 0xF3, b3, 0x00]
}

pub fn slice(len: usize) -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x01, 0x01];
    bytes.extend((0..len).map(|i| 0x10 + (i % 0x30) as u8));
    bytes
}

/// Video elementary stream builder that records the byte span of every picture.
#[derive(Debug)]
pub struct EsBuilder {
    bytes: Vec<u8>,
    samples: Vec<(u64, u64)>,
    mpeg2: bool,
    pending: Option<usize>,
}
impl EsBuilder {
    pub fn new(mpeg2: bool, progressive_sequence: bool) -> Self {
        let mut this = EsBuilder {
            bytes: Vec::new(),
            samples: Vec::new(),
            mpeg2,
            pending: None,
        };
        this.sequence_header(progressive_sequence);
        this
    }

    pub fn sequence_header(&mut self, progressive_sequence: bool) -> &mut Self {
        self.mark();
        self.bytes.extend_from_slice(&SEQUENCE_HEADER);
        if self.mpeg2 {
            self.bytes.extend(sequence_extension(progressive_sequence));
        }
        self
    }

    pub fn gop(&mut self, closed: bool) -> &mut Self {
        self.mark();
        self.bytes.extend(gop_header(closed));
        self
    }

    pub fn picture(&mut self, temporal_reference: u16, coding_type: u8) -> &mut Self {
        self.picture_with(temporal_reference, coding_type, false)
    }

    pub fn picture_with(
        &mut self,
        temporal_reference: u16,
        coding_type: u8,
        repeat_first_field: bool,
    ) -> &mut Self {
        self.mark();
        let start = self.pending.take().unwrap_or(self.bytes.len());
        self.bytes.extend(picture_header(temporal_reference, coding_type));
        if self.mpeg2 {
            self.bytes
                .extend(picture_coding_extension(true, repeat_first_field));
        }
        self.bytes.extend(slice(150 + usize::from(temporal_reference) * 7));
        self.bytes.extend(slice(25));
        self.samples
            .push((start as u64, (self.bytes.len() - start) as u64));
        self
    }

    /// Returns the stream (terminated by a sequence end code) and the `(position, size)` of each picture.
    pub fn finish(&self) -> (Vec<u8>, Vec<(u64, u64)>) {
        let mut bytes = self.bytes.clone();
        bytes.extend_from_slice(&SEQUENCE_END);
        (bytes, self.samples.clone())
    }

    /// Returns the bytes of each picture (including the headers preceding it).
    pub fn pictures(&self) -> Vec<Vec<u8>> {
        self.samples
            .iter()
            .map(|&(p, s)| self.bytes[p as usize..(p + s) as usize].to_vec())
            .collect()
    }

    fn mark(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.bytes.len());
        }
    }
}

/// Two GOPs of 2 and 3 pictures, then a GOP of 2 pictures whose I-picture repeats its first field.
pub fn gop_2_3_2(mpeg2: bool) -> EsBuilder {
    let mut es = EsBuilder::new(mpeg2, false);
    es.gop(true).picture(1, PICTURE_I).picture(0, PICTURE_B);
    es.gop(false)
        .picture(2, PICTURE_I)
        .picture(0, PICTURE_B)
        .picture(1, PICTURE_B);
    es.gop(false)
        .picture_with(1, PICTURE_I, true)
        .picture(0, PICTURE_B);
    es
}

pub fn psi_section(table_id: u8, id: u16, body: &[u8]) -> Vec<u8> {
    let len = 5 + body.len() + 4;
    let mut bytes = vec![
        table_id,
        0xB0 | (len >> 8) as u8,
        len as u8,
        (id >> 8) as u8,
        id as u8,
        0xC3,
        0x00,
        0x00,
    ];
    bytes.extend_from_slice(body);
    let crc = CRC.checksum(&bytes);
    bytes.extend_from_slice(&crc.to_be_bytes());
    bytes
}

pub fn pat_section(programs: &[(u16, u16)]) -> Vec<u8> {
    let mut body = Vec::new();
    for &(program_num, pid) in programs {
        body.extend_from_slice(&program_num.to_be_bytes());
        body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
    }
    psi_section(0x00, 1, &body)
}

pub fn pmt_section(program_num: u16, pcr_pid: u16, streams: &[(u8, u16)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(0xE000 | pcr_pid).to_be_bytes());
    body.extend_from_slice(&[0xF0, 0x00]);
    for &(stream_type, pid) in streams {
        body.push(stream_type);
        body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
        body.extend_from_slice(&[0xF0, 0x00]);
    }
    psi_section(0x02, program_num, &body)
}

fn encode_pcr(base: u64) -> [u8; 6] {
    [
        (base >> 25) as u8,
        (base >> 17) as u8,
        (base >> 9) as u8,
        (base >> 1) as u8,
        ((base & 1) << 7) as u8 | 0x7E,
        0x00,
    ]
}

/// Transport stream builder.
#[derive(Debug)]
pub struct TsBuilder {
    format: PacketFormat,
    units: Vec<Vec<u8>>,
    counters: HashMap<u16, u8>,
}
impl TsBuilder {
    pub fn new(format: PacketFormat) -> Self {
        TsBuilder {
            format,
            units: Vec::new(),
            counters: HashMap::new(),
        }
    }

    /// Returns the file position of the next packet.
    pub fn position(&self) -> u64 {
        self.units.iter().map(|u| u.len() as u64).sum()
    }

    /// Appends a packet. `payload` is padded by adaptation field stuffing.
    pub fn packet(
        &mut self,
        pid: u16,
        pusi: bool,
        random_access: bool,
        pcr: Option<u64>,
        payload: &[u8],
    ) -> &mut Self {
        assert!(payload.len() <= 184);
        let counter = self.counters.entry(pid).or_insert(0);
        let cc = *counter;
        *counter = (cc + 1) & 0x0F;

        let mut adaptation = Vec::new();
        if random_access || pcr.is_some() {
            adaptation.push(((random_access as u8) << 6) | ((pcr.is_some() as u8) << 4));
            if let Some(base) = pcr {
                adaptation.extend_from_slice(&encode_pcr(base));
            }
        }
        let has_adaptation = !adaptation.is_empty() || payload.len() < 184;
        let mut packet = vec![
            0x47,
            ((pusi as u8) << 6) | (pid >> 8) as u8,
            pid as u8,
            (if has_adaptation { 0x30 } else { 0x10 }) | cc,
        ];
        if has_adaptation {
            let field_len = 184 - payload.len() - 1;
            assert!(adaptation.len() <= field_len);
            if field_len > 0 && adaptation.is_empty() {
                adaptation.push(0x00);
            }
            adaptation.resize(field_len, 0xFF);
            packet.push(field_len as u8);
            packet.extend(adaptation);
        }
        packet.extend_from_slice(payload);
        assert_eq!(packet.len(), 188);
        self.push_unit(packet);
        self
    }

    /// Appends a PSI section, splitting it into `chunk` byte pieces.
    pub fn section(&mut self, pid: u16, section: &[u8], chunk: usize) -> &mut Self {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(section);
        let chunk = chunk.min(184);
        for (i, piece) in bytes.chunks(chunk).enumerate() {
            self.packet(pid, i == 0, false, None, piece);
        }
        self
    }

    pub fn pat(&mut self, programs: &[(u16, u16)]) -> &mut Self {
        self.section(0x0000, &pat_section(programs), 184)
    }

    pub fn pmt(&mut self, pid: u16, pcr_pid: u16, streams: &[(u8, u16)]) -> &mut Self {
        self.section(pid, &pmt_section(1, pcr_pid, streams), 184)
    }

    /// Appends a PES packet and returns the number of TS packets it occupies.
    pub fn pes(
        &mut self,
        pid: u16,
        stream_id: u8,
        pts: u64,
        dts: Option<u64>,
        payload: &[u8],
        random_access: bool,
        pcr: Option<u64>,
    ) -> usize {
        let header = PesHeader::new(
            StreamId::new(stream_id),
            Timestamp::wrapping(pts),
            dts.map(Timestamp::wrapping),
            payload.len(),
        );
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        bytes.extend_from_slice(payload);

        let mut first = 184;
        if random_access || pcr.is_some() {
            first -= 2;
        }
        if pcr.is_some() {
            first -= 6;
        }
        let first = first.min(bytes.len());
        self.packet(pid, true, random_access, pcr, &bytes[..first]);
        let mut count = 1;
        for piece in bytes[first..].chunks(184) {
            self.packet(pid, false, false, None, piece);
            count += 1;
        }
        count
    }

    pub fn null(&mut self) -> &mut Self {
        self.packet(0x1FFF, false, false, None, &[0xFF; 184])
    }

    /// Appends raw bytes that do not form a packet.
    pub fn garbage(&mut self, bytes: &[u8]) -> &mut Self {
        self.units.push(bytes.to_vec());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.units.concat()
    }

    fn push_unit(&mut self, packet: Vec<u8>) {
        let mut unit = match self.format {
            PacketFormat::Timestamped => vec![0x00; 4],
            _ => Vec::new(),
        };
        unit.extend(packet);
        if self.format == PacketFormat::Fec {
            unit.extend_from_slice(&[0x00; 16]);
        }
        self.units.push(unit);
    }
}
