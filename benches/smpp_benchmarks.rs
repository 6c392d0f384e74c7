// ABOUTME: Benchmark suite for the PDU codec
// ABOUTME: Measures framing, decoding, encoding and message-size effects on submit_sm

use bytes::{Bytes, BytesMut};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use smpp_gateway::codec::split_frame;
use smpp_gateway::datatypes::tlv::tags;
use smpp_gateway::datatypes::*;
use smpp_gateway::{Encodable, Frame};
use std::time::Duration;

fn create_sample_submit_sm(text: &str) -> SubmitSm {
    let mut pdu = SubmitSm::new(
        1,
        Address::new(TypeOfNumber::Unknown, NumericPlanIndicator::Unknown, "12345"),
        Address::new(TypeOfNumber::International, NumericPlanIndicator::Isdn, "67890"),
    );
    pdu.registered_delivery = RegisteredDelivery::new(1);
    pdu.set_message(text.as_bytes()).unwrap();
    pdu.tlvs.push(Tlv::from_u16(tags::USER_MESSAGE_REFERENCE, 1));
    pdu
}

fn create_sample_receipt() -> DeliverSm {
    let mut pdu = DeliverSm::new(
        1,
        Address::new(TypeOfNumber::International, NumericPlanIndicator::Isdn, "67890"),
        Address::new(TypeOfNumber::Unknown, NumericPlanIndicator::Unknown, "12345"),
    );
    pdu.esm_class = EsmClass::new(EsmClass::SMSC_DELIVERY_RECEIPT);
    pdu.set_message(b"id:MSG1 sub:001 dlvrd:001 submit date:2401011200 done date:2401011201 stat:DELIVRD err:000 text:Hello")
        .unwrap();
    pdu.tlvs.push(Tlv::from_cstring(tags::RECEIPTED_MESSAGE_ID, "MSG1"));
    pdu.tlvs
        .push(Tlv::from_u8(tags::MESSAGE_STATE, MessageState::Delivered as u8));
    pdu
}

fn create_sample_bind() -> BindRequest {
    BindRequest::new(BindMode::Transceiver, 1, "test_system", "password")
}

fn frame_bytes(pdu: &impl Encodable) -> Bytes {
    pdu.to_bytes().unwrap()
}

fn bench_split_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_frame");
    group.measurement_time(Duration::from_secs(10));

    let submit = frame_bytes(&create_sample_submit_sm("Hello World"));
    group.bench_function("submit_sm", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(black_box(submit.as_ref()));
            split_frame(&mut buf).unwrap()
        })
    });

    // ten enquire_links back to back, as a busy socket delivers them
    let mut burst = BytesMut::new();
    for sequence in 1..=10 {
        burst.extend_from_slice(&frame_bytes(&EnquireLink::new(sequence)));
    }
    let burst = burst.freeze();
    group.bench_function("enquire_link_burst", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(black_box(burst.as_ref()));
            let mut count = 0;
            while let Some(frame) = split_frame(&mut buf).unwrap() {
                black_box(frame);
                count += 1;
            }
            count
        })
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.measurement_time(Duration::from_secs(10));

    let submit = frame_bytes(&create_sample_submit_sm("Hello World"));
    group.bench_function("submit_sm", |b| {
        b.iter(|| Frame::decode(black_box(&submit)).unwrap())
    });

    let receipt = frame_bytes(&create_sample_receipt());
    group.bench_function("deliver_sm_receipt", |b| {
        b.iter(|| Frame::decode(black_box(&receipt)).unwrap())
    });

    let bind = frame_bytes(&create_sample_bind());
    group.bench_function("bind_transceiver", |b| {
        b.iter(|| Frame::decode(black_box(&bind)).unwrap())
    });

    let enquire = frame_bytes(&EnquireLink::new(1));
    group.bench_function("enquire_link", |b| {
        b.iter(|| Frame::decode(black_box(&enquire)).unwrap())
    });

    group.finish();
}

fn bench_receipt_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("receipt");

    let with_tlvs = create_sample_receipt();
    group.bench_function("tlv", |b| b.iter(|| black_box(&with_tlvs).receipt()));

    let mut text_only = create_sample_receipt();
    text_only.tlvs.clear();
    group.bench_function("text", |b| b.iter(|| black_box(&text_only).receipt()));

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.measurement_time(Duration::from_secs(10));

    let submit = create_sample_submit_sm("Hello World");
    group.bench_function("submit_sm", |b| b.iter(|| black_box(&submit).to_bytes()));

    let receipt = create_sample_receipt();
    group.bench_function("deliver_sm_receipt", |b| {
        b.iter(|| black_box(&receipt).to_bytes())
    });

    let bind = create_sample_bind();
    group.bench_function("bind_transceiver", |b| {
        b.iter(|| black_box(&bind).to_bytes())
    });

    let enquire = EnquireLink::new(1);
    group.bench_function("enquire_link", |b| {
        b.iter(|| black_box(&enquire).to_bytes())
    });

    group.finish();
}

fn bench_message_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_sizes");
    group.measurement_time(Duration::from_secs(10));

    // up to 254 in short_message, beyond that message_payload
    let message_sizes = [10, 160, 254, 1000, 4000];

    for &size in &message_sizes {
        let text = "A".repeat(size);
        let bytes = frame_bytes(&create_sample_submit_sm(&text));

        group.bench_with_input(
            BenchmarkId::new("submit_sm_encode", size),
            &text,
            |b, text| b.iter(|| create_sample_submit_sm(black_box(text)).to_bytes().unwrap()),
        );
        group.bench_with_input(
            BenchmarkId::new("submit_sm_decode", size),
            &bytes,
            |b, bytes| b.iter(|| Frame::decode(black_box(bytes)).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_split_frame,
    bench_decode,
    bench_receipt_extraction,
    bench_encode,
    bench_message_sizes
);
criterion_main!(benches);
