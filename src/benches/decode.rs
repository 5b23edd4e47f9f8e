#[macro_use]
extern crate criterion;
extern crate evtx_binxml;

use criterion::Criterion;
use evtx_binxml::{BinXmlDecoder, ChunkContext, Template};

fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn inline_name(buf: &mut Vec<u8>, name: &str) {
    let here = buf.len() as u32 + 4;
    buf.extend_from_slice(&here.to_le_bytes());
    buf.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    buf.extend_from_slice(&(name.encode_utf16().count() as u16).to_le_bytes());
    buf.extend(utf16(name));
    buf.extend_from_slice(&[0, 0]);
}

/// `<Data Name="...">%0</Data>` repeated under an `<EventData>` root.
fn template_body(fields: usize) -> Vec<u8> {
    let mut buf = vec![0x0f, 0x01, 0x01, 0x00];
    buf.extend_from_slice(&[0x01, 0, 0, 0, 0, 0, 0]);
    inline_name(&mut buf, "EventData");
    buf.push(0x02);

    for i in 0..fields {
        buf.extend_from_slice(&[0x41, 0, 0, 0, 0, 0, 0]);
        inline_name(&mut buf, "Data");
        buf.extend_from_slice(&0_u32.to_le_bytes());
        buf.push(0x06);
        inline_name(&mut buf, "Name");
        let label = utf16(&format!("Field{}", i));
        buf.extend_from_slice(&[0x05, 0x01]);
        buf.extend_from_slice(&((label.len() / 2) as u16).to_le_bytes());
        buf.extend(label);
        buf.push(0x02);
        buf.push(0x0d);
        buf.extend_from_slice(&(i as u16).to_le_bytes());
        buf.push(0x01);
        buf.push(0x04);
    }

    buf.extend_from_slice(&[0x04, 0x00]);
    buf
}

fn record(fields: usize) -> Vec<u8> {
    let mut buf = vec![0x0f, 0x01, 0x01, 0x00, 0x0c];
    buf.extend_from_slice(&1_u32.to_le_bytes());
    buf.extend_from_slice(&0_u32.to_le_bytes());
    buf.extend_from_slice(&(fields as u16).to_le_bytes());
    for i in 0..fields {
        let value = utf16(&format!("value <{}>", i));
        buf.extend_from_slice(&(value.len() as u16).to_le_bytes());
        buf.extend_from_slice(&1_u16.to_le_bytes());
        buf.extend(value);
    }
    buf.push(0x00);
    buf
}

fn criterion_benchmark(c: &mut Criterion) {
    let fields = 32;
    let mut chunk = ChunkContext::new();
    let body = template_body(fields);
    let root = BinXmlDecoder::new(&chunk)
        .decode_tokens(&body, 0)
        .expect("template body to parse")
        .into_iter()
        .find(|t| !t.is_marker())
        .expect("template body to have a root");
    chunk.add_template(Template::with_id(1, root));

    let one = record(fields);
    let mut many = vec![];
    let mut offsets = vec![];
    for _ in 0..100 {
        offsets.push(many.len());
        many.extend_from_slice(&one);
    }

    let decoder = BinXmlDecoder::new(&chunk);
    c.bench_function("decode 1 record", |b| b.iter(|| decoder.decode(&one, 0)));
    c.bench_function("decode 100 records", |b| {
        b.iter(|| decoder.decode_many(&many, &offsets))
    });
    c.bench_function("parse template body", |b| {
        b.iter(|| decoder.decode_tokens(&body, 0))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
