//! Builds synthetic replays laid out like the real thing: a padded header, a first chunky stream
//! of 96 bytes, and a second stream holding the info folder and a data chunk, followed by tick
//! data with chat records.

#![allow(dead_code)]

pub const VP_GAME_MAGIC: u32 = 0x6038_72a3;

pub enum Chunk {
    Folder(&'static [u8; 8], u32, Vec<Chunk>),
    Data(&'static [u8; 8], u32, Vec<u8>),
}

impl Chunk {
    pub fn encode(&self) -> Vec<u8> {
        let (tag, version, body) = match self {
            Chunk::Folder(tag, version, children) => {
                (tag, version, children.iter().flat_map(|c| c.encode()).collect())
            }
            Chunk::Data(tag, version, body) => (tag, version, body.clone()),
        };

        let mut out = Vec::new();
        out.extend_from_slice(&tag[..]);
        put_u32(&mut out, *version);
        put_u32(&mut out, body.len() as u32);
        put_u32(&mut out, 0);
        out.extend_from_slice(&[0u8; 8]);
        out.extend(body);
        out
    }
}

pub fn put_u32(out: &mut Vec<u8>, x: u32) {
    out.extend_from_slice(&x.to_le_bytes());
}

pub fn wide(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn put_wide(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.encode_utf16().count() as u32);
    out.extend(wide(s));
}

pub fn put_ascii(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

#[derive(Debug, Clone)]
pub struct PlayerSpec {
    pub name: String,
    pub slot: u8,
    pub team: u8,
    pub faction: String,
}

impl PlayerSpec {
    pub fn new(name: &str, team: u8) -> Self {
        PlayerSpec {
            name: String::from(name),
            slot: 0,
            team,
            faction: String::from(if team == 0 { "allies" } else { "axis" }),
        }
    }

    pub fn body(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_wide(&mut out, &self.name);
        out.push(self.slot);
        out.extend_from_slice(&[0, 0, 0]);
        out.push(self.team);
        out.extend_from_slice(&[0, 0, 0]);
        put_ascii(&mut out, &self.faction);
        out.extend_from_slice(&[0u8; 8]);
        out
    }
}

pub fn match_settings(vp_exponent: u32, match_type: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; 16];
    put_u32(&mut out, 1); // fixed start
    put_u32(&mut out, 0);
    put_u32(&mut out, 1); // high resources
    put_u32(&mut out, 0);
    put_u32(&mut out, vp_exponent);
    out.extend_from_slice(&[0u8; 5]);
    put_wide(&mut out, "Semois showdown");
    out.extend_from_slice(&[0u8; 8]);
    put_u32(&mut out, VP_GAME_MAGIC);
    out.extend_from_slice(&[0u8; 23]);
    put_ascii(&mut out, "0");
    out.extend_from_slice(&[0u8; 4]);
    put_ascii(&mut out, "2");
    out.extend_from_slice(&[0u8; 8]);
    put_u32(&mut out, 2);
    put_ascii(&mut out, "build");
    put_ascii(&mut out, "2.602.0");
    put_ascii(&mut out, "lobby");
    put_u32(&mut out, match_type.len() as u32);
    out.extend_from_slice(match_type);
    out
}

pub fn map_descriptor(repeated: Option<&str>) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, 0);
    put_wide(&mut out, "2007-12-24");
    out.extend_from_slice(&[0u8; 12]);
    put_ascii(&mut out, "RelicCOH");
    put_ascii(&mut out, "data:scenarios\\mp\\2p_semois");
    out.extend_from_slice(&[0u8; 20]);
    put_wide(&mut out, "Semois");
    match repeated {
        Some(s) => {
            put_u32(&mut out, s.encode_utf16().count() as u32);
            out.extend(wide(s));
        }
        None => put_u32(&mut out, 0),
    }
    put_wide(&mut out, "A river crossing");
    put_u32(&mut out, 0);
    put_u32(&mut out, 512);
    put_u32(&mut out, 384);
    out.extend_from_slice(&[0u8; 12]);
    out
}

/// A chat record as found in the tick data
pub fn chat_record(name: &str, text: &str) -> Vec<u8> {
    let mut message = Vec::new();
    put_wide(&mut message, name);
    put_u32(&mut message, 1000);
    put_u32(&mut message, 0);
    put_u32(&mut message, 1);
    put_wide(&mut message, text);

    let mut out = Vec::new();
    put_u32(&mut out, message.len() as u32 + 8);
    put_u32(&mut out, 1);
    put_u32(&mut out, message.len() as u32);
    out.extend(message);
    out
}

fn chunky_header() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"Relic Chunky");
    out.extend_from_slice(b"\r\n\x1a\0");
    put_u32(&mut out, 3);
    put_u32(&mut out, 1);
    put_u32(&mut out, 36);
    out.extend_from_slice(&[0u8; 8]);
    out
}

pub struct ReplayBuilder {
    pub date: String,
    pub players: Vec<PlayerSpec>,
    pub chat: Vec<(String, String)>,
    pub vp_exponent: u32,
    pub match_type: Vec<u8>,
}

impl ReplayBuilder {
    pub fn new() -> Self {
        ReplayBuilder {
            date: String::from("24.12.2007 18:30"),
            players: Vec::new(),
            chat: Vec::new(),
            vp_exponent: 1,
            match_type: b"automatch".to_vec(),
        }
    }

    pub fn player(mut self, name: &str, team: u8) -> Self {
        self.players.push(PlayerSpec::new(name, team));
        self
    }

    pub fn player_spec(mut self, spec: PlayerSpec) -> Self {
        self.players.push(spec);
        self
    }

    pub fn chat(mut self, name: &str, text: &str) -> Self {
        self.chat.push((String::from(name), String::from(text)));
        self
    }

    pub fn info_folder(&self) -> Chunk {
        let mut children = vec![
            Chunk::Data(b"DATASDSC", 2004, map_descriptor(None)),
            Chunk::Data(b"DATABASE", 11, match_settings(self.vp_exponent, &self.match_type)),
        ];

        for p in &self.players {
            children.push(Chunk::Folder(
                b"FOLDGPLY",
                1,
                vec![
                    Chunk::Data(b"DATAINFO", 6, p.body()),
                    Chunk::Data(b"DATAPLAS", 1, vec![7u8; 12]),
                ],
            ));
        }

        Chunk::Folder(b"FOLDINFO", 1, children)
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with(self.info_folder())
    }

    /// Builds the replay around a custom info folder
    pub fn build_with(&self, info: Chunk) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, 8);
        out.extend_from_slice(b"COH__REC");
        out.extend(wide(&self.date));
        out.extend_from_slice(&[0, 0]);
        out.resize(76, 0);

        out.extend(chunky_header());
        out.extend(Chunk::Folder(b"FOLDPOST", 1, vec![Chunk::Data(b"DATAPOST", 1, vec![0u8; 4])]).encode());
        assert_eq!(out.len(), 76 + 96);

        out.extend(chunky_header());
        out.extend(info.encode());
        out.extend(Chunk::Data(b"DATADATA", 1, vec![0xabu8; 24]).encode());

        // tick data
        out.extend_from_slice(&[0x11u8; 40]);
        for (name, text) in &self.chat {
            out.extend(chat_record(name, text));
            out.extend_from_slice(&[0x22u8; 9]);
        }
        out
    }
}

/// Number of times `needle` occurs in `haystack`
pub fn occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

/// Checks every container's body length against its children
pub fn assert_consistent(data: &[u8]) {
    let replay = chunkyrec::ParserBuilder::new(data).parse().unwrap();
    let tree = &replay.chunks;
    tree.validate().unwrap();
    for (id, node) in tree.iter().filter(|(_, n)| n.is_container()) {
        let spans: usize = tree.children(id).map(|(_, c)| c.span()).sum();
        assert_eq!(spans, node.body_len as usize, "{} body length", node.tag);
    }
}
