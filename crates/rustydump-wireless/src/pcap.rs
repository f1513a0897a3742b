//! Classic pcap capture files
//!
//! [`PcapWriter`] backs the raw-frame sink; [`PcapReader`] feeds recorded
//! captures back through the analyzer. Only 802.11 link types are
//! accepted: bare frames (105) and radiotap-prefixed frames (127).

use std::io::{self, Read, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};

use crate::error::{Result, WirelessError};
use crate::radiotap::{self, RadiotapHeader, RxInfo};

const PCAP_MAGIC: u32 = 0xa1b2c3d4;
const PCAP_MAGIC_NANOS: u32 = 0xa1b23c4d;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
const PCAP_SNAPLEN: u32 = 65535;

/// Records larger than this are treated as corruption
const MAX_RECORD_LEN: u32 = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Ieee80211,
    Radiotap,
}

impl LinkType {
    pub fn code(&self) -> u32 {
        match self {
            Self::Ieee80211 => 105,
            Self::Radiotap => 127,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            105 => Ok(Self::Ieee80211),
            127 => Ok(Self::Radiotap),
            other => Err(WirelessError::UnsupportedLinkType(other)),
        }
    }
}

pub struct PcapWriter<W: Write> {
    w: W,
    link: LinkType,
    written: u64,
}

impl<W: Write> PcapWriter<W> {
    pub fn new(mut w: W, link: LinkType) -> io::Result<Self> {
        write_global_header(&mut w, link)?;
        Ok(Self { w, link, written: 0 })
    }

    pub fn link_type(&self) -> LinkType {
        self.link
    }

    /// Records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Write an 802.11 frame, prefixed with a radiotap header built from
    /// `rx` when the file carries radiotap.
    pub fn write_frame(&mut self, frame: &[u8], rx: &RxInfo) -> io::Result<()> {
        match self.link {
            LinkType::Ieee80211 => self.write_packet(rx.timestamp, frame),
            LinkType::Radiotap => {
                let header = RadiotapHeader::for_rx(rx);
                let mut data = Vec::with_capacity(header.len() + frame.len());
                data.extend_from_slice(header.as_bytes());
                data.extend_from_slice(frame);
                self.write_packet(rx.timestamp, &data)
            }
        }
    }

    pub fn write_packet(&mut self, ts: SystemTime, data: &[u8]) -> io::Result<()> {
        let (sec, usec) = system_time_to_sec_usec(ts);
        let len = u32::try_from(data.len()).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record too large"))?;
        write_record_header(&mut self.w, sec, usec, len)?;
        self.w.write_all(data)?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

fn write_global_header<W: Write>(w: &mut W, link: LinkType) -> io::Result<()> {
    w.write_all(&PCAP_MAGIC.to_le_bytes())?;
    w.write_all(&PCAP_VERSION_MAJOR.to_le_bytes())?;
    w.write_all(&PCAP_VERSION_MINOR.to_le_bytes())?;
    w.write_all(&0i32.to_le_bytes())?; // thiszone
    w.write_all(&0u32.to_le_bytes())?; // sigfigs
    w.write_all(&PCAP_SNAPLEN.to_le_bytes())?;
    w.write_all(&link.code().to_le_bytes())?;
    Ok(())
}

fn write_record_header<W: Write>(w: &mut W, sec: u32, usec: u32, len: u32) -> io::Result<()> {
    w.write_all(&sec.to_le_bytes())?;
    w.write_all(&usec.to_le_bytes())?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&len.to_le_bytes())?;
    Ok(())
}

fn system_time_to_sec_usec(ts: SystemTime) -> (u32, u32) {
    let dur = ts.duration_since(UNIX_EPOCH).unwrap_or_default();
    let sec = dur.as_secs().min(u32::MAX as u64) as u32;
    (sec, dur.subsec_micros())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u32(&self, buf: &[u8]) -> u32 {
        match self {
            Self::Little => LittleEndian::read_u32(buf),
            Self::Big => BigEndian::read_u32(buf),
        }
    }
}

/// One capture record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcapRecord {
    pub timestamp: SystemTime,
    /// Length on the wire
    pub orig_len: u32,
    pub data: Vec<u8>,
}

impl PcapRecord {
    /// Split the record into radio metadata and the bare 802.11 frame.
    /// `None` for a malformed radiotap header or a frame with a bad FCS.
    pub fn frame(&self, link: LinkType) -> Option<(RxInfo, &[u8])> {
        match link {
            LinkType::Ieee80211 => Some((RxInfo::new(self.timestamp), &self.data)),
            LinkType::Radiotap => {
                let decoded = radiotap::decode(&self.data, self.timestamp)?;
                if decoded.bad_fcs {
                    return None;
                }
                Some((decoded.rx, decoded.frame))
            }
        }
    }
}

pub struct PcapReader<R: Read> {
    r: R,
    endian: Endian,
    nanos: bool,
    link: LinkType,
    snaplen: u32,
}

impl<R: Read> PcapReader<R> {
    /// Read and validate the global header.
    pub fn new(mut r: R) -> Result<Self> {
        let mut header = [0u8; 24];
        r.read_exact(&mut header)
            .map_err(|err| WirelessError::pcap(format!("missing global header: {}", err)))?;

        let (endian, nanos) = match (LittleEndian::read_u32(&header[0..4]), BigEndian::read_u32(&header[0..4])) {
            (PCAP_MAGIC, _) => (Endian::Little, false),
            (PCAP_MAGIC_NANOS, _) => (Endian::Little, true),
            (_, PCAP_MAGIC) => (Endian::Big, false),
            (_, PCAP_MAGIC_NANOS) => (Endian::Big, true),
            (magic, _) => return Err(WirelessError::pcap(format!("bad magic 0x{:08x}", magic))),
        };
        let snaplen = endian.u32(&header[16..20]);
        let link = LinkType::from_code(endian.u32(&header[20..24]))?;

        tracing::debug!(target: "capture", link = link.code(), snaplen, ?endian, "pcap_opened");
        Ok(Self {
            r,
            endian,
            nanos,
            link,
            snaplen,
        })
    }

    pub fn link_type(&self) -> LinkType {
        self.link
    }

    pub fn snaplen(&self) -> u32 {
        self.snaplen
    }

    /// Next record, `None` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<PcapRecord>> {
        let sec = match self.read_u32() {
            Ok(sec) => sec,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let frac = self.read_u32().map_err(truncated)?;
        let incl_len = self.read_u32().map_err(truncated)?;
        let orig_len = self.read_u32().map_err(truncated)?;
        if incl_len > MAX_RECORD_LEN {
            return Err(WirelessError::pcap(format!("record length {} exceeds limit", incl_len)));
        }

        let mut data = vec![0u8; incl_len as usize];
        self.r.read_exact(&mut data).map_err(truncated)?;

        let frac = if self.nanos {
            Duration::from_nanos(u64::from(frac))
        } else {
            Duration::from_micros(u64::from(frac))
        };
        Ok(Some(PcapRecord {
            timestamp: UNIX_EPOCH + Duration::from_secs(u64::from(sec)) + frac,
            orig_len,
            data,
        }))
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        match self.endian {
            Endian::Little => self.r.read_u32::<LittleEndian>(),
            Endian::Big => self.r.read_u32::<BigEndian>(),
        }
    }
}

impl<R: Read> Iterator for PcapReader<R> {
    type Item = Result<PcapRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn truncated(err: io::Error) -> WirelessError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        WirelessError::pcap("truncated record")
    } else {
        WirelessError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcap_header_and_record() {
        let mut writer = PcapWriter::new(Vec::new(), LinkType::Ieee80211).unwrap();
        let packet = vec![0x01, 0x02, 0x03, 0x04];
        let ts = UNIX_EPOCH + Duration::from_secs(1) + Duration::from_micros(2);
        writer.write_packet(ts, &packet).unwrap();

        let buf = writer.into_inner();
        assert_eq!(buf.len(), 24 + 16 + packet.len());

        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        assert_eq!(magic, PCAP_MAGIC);
        let link = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        assert_eq!(link, 105);

        let incl_len = u32::from_le_bytes(buf[32..36].try_into().unwrap());
        let orig_len = u32::from_le_bytes(buf[36..40].try_into().unwrap());
        assert_eq!(incl_len, packet.len() as u32);
        assert_eq!(orig_len, packet.len() as u32);
    }

    #[test]
    fn test_radiotap_file_reads_back() {
        let ts = UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_micros(250);
        let rx = RxInfo::new(ts).with_power(-52).with_channel(6).with_rate(54_000_000);
        let frame = [0x80u8, 0x00, 0x00, 0x00, 0xFF, 0xFF];

        let mut writer = PcapWriter::new(Vec::new(), LinkType::Radiotap).unwrap();
        writer.write_frame(&frame, &rx).unwrap();
        assert_eq!(writer.written(), 1);

        let buf = writer.into_inner();
        let mut reader = PcapReader::new(buf.as_slice()).unwrap();
        assert_eq!(reader.link_type(), LinkType::Radiotap);
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.timestamp, ts);

        let (decoded, bare) = record.frame(LinkType::Radiotap).unwrap();
        assert_eq!(bare, &frame);
        assert_eq!(decoded.power, Some(-52));
        assert_eq!(decoded.channel, Some(6));
        assert_eq!(decoded.rate, 54_000_000);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_big_endian_file() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&PCAP_MAGIC.to_be_bytes());
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&[0; 8]);
        buf.extend_from_slice(&65535u32.to_be_bytes());
        buf.extend_from_slice(&105u32.to_be_bytes());
        buf.extend_from_slice(&10u32.to_be_bytes());
        buf.extend_from_slice(&5u32.to_be_bytes());
        buf.extend_from_slice(&3u32.to_be_bytes());
        buf.extend_from_slice(&3u32.to_be_bytes());
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let records: Vec<_> = PcapReader::new(buf.as_slice())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(records[0].timestamp, UNIX_EPOCH + Duration::from_secs(10) + Duration::from_micros(5));
    }

    #[test]
    fn test_rejects_other_link_types_and_truncation() {
        let mut buf = Vec::new();
        write_global_header(&mut buf, LinkType::Ieee80211).unwrap();
        buf[20..24].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(
            PcapReader::new(buf.as_slice()),
            Err(WirelessError::UnsupportedLinkType(1))
        ));

        let mut writer = PcapWriter::new(Vec::new(), LinkType::Ieee80211).unwrap();
        writer.write_packet(UNIX_EPOCH, &[1, 2, 3, 4]).unwrap();
        let mut buf = writer.into_inner();
        buf.truncate(buf.len() - 2);
        let mut reader = PcapReader::new(buf.as_slice()).unwrap();
        assert!(matches!(reader.next_record(), Err(WirelessError::Pcap(_))));

        assert!(PcapReader::new(&b"nope"[..]).is_err());
    }

    #[test]
    fn test_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.pcap");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = PcapWriter::new(io::BufWriter::new(file), LinkType::Radiotap).unwrap();
        writer.write_frame(&[0xD4, 0x00], &RxInfo::new(UNIX_EPOCH)).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let reader = PcapReader::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(reader.count(), 1);
    }
}
