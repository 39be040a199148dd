//! Integration tests for gbx-link.
//!
//! These drive a full cartridge session against the scripted device.

use std::io::Cursor;
use std::time::Duration;

use gbx_link::protocol::{build_response, Command};
use gbx_link::transport::{ScriptedTransport, Step};
use gbx_link::{
    CancelToken, CartridgeClient, LinkConfig, LinkError, NoProgress, VerifyOutcome,
};

/// "POKEMON RED", MBC3+RAM+BATTERY, 1 MB ROM, 32 KB RAM, NUL-terminated title.
fn pokemon_header() -> Vec<u8> {
    let title = b"POKEMON RED";
    let mut payload = vec![title.len() as u8];
    payload.extend_from_slice(title);
    payload.push(0);
    payload.extend_from_slice(&[0x13, 0x05, 0x03, 0x00, 0x01]);
    payload
}

fn image(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Split a frame into slices with a pause between them.
fn trickle(frame: &[u8], slice: usize, gap: Duration) -> Vec<Step> {
    frame
        .chunks(slice)
        .flat_map(|chunk| [Step::bytes(chunk), Step::pause(gap)])
        .collect()
}

fn client(device: ScriptedTransport) -> CartridgeClient<ScriptedTransport> {
    CartridgeClient::new(device, LinkConfig::default(), CancelToken::new())
}

/// Test header read with noise, tiny reads and a terminated title.
#[tokio::test(start_paused = true)]
async fn test_header_through_noisy_line() {
    let mut reply = vec![Step::bytes([0x00u8, 0xFF, 0x02, 0x7E])];
    reply.extend(trickle(
        &build_response(&pokemon_header()),
        3,
        Duration::from_millis(400),
    ));
    let mut client = client(
        ScriptedTransport::new()
            .max_read(2)
            .reply(Command::ReadHeader, reply),
    );

    let meta = client.read_header().await.unwrap();

    assert_eq!(meta.title_str(), "POKEMON RED");
    assert_eq!(meta.cartridge_type.describe(), "13h - MBC3+RAM+BATTERY");
    assert_eq!(meta.rom_size.bytes(), Some(1024 * 1024));
    assert_eq!(meta.ram_size.bytes(), Some(32 * 1024));
    assert!(meta.checksum_valid);
    assert_eq!(meta.rom_file_name().as_deref(), Some("POKEMON RED.gb"));
}

/// Test a full ROM dump with a slow, bursty device.
#[tokio::test(start_paused = true)]
async fn test_rom_dump_with_latency() {
    let rom = image(64 * 1024, 7);
    let mut client = client(
        ScriptedTransport::new()
            .max_read(300)
            .reply_frame(Command::ReadHeader, &pokemon_header())
            .reply(
                Command::ReadRom,
                trickle(&build_response(&rom), 4096, Duration::from_millis(2500)),
            ),
    );
    client.read_header().await.unwrap();

    let mut sink = Vec::new();
    let mut updates: Vec<u64> = Vec::new();
    let mut progress = |_total: u64, remaining: u64| updates.push(remaining);
    let written = client.read_rom(&mut sink, &mut progress).await.unwrap();

    assert_eq!(written, rom.len() as u64);
    assert_eq!(sink, rom);
    assert!(updates.windows(2).all(|w| w[0] > w[1]));
    assert_eq!(updates.last(), Some(&0));
}

/// Test RAM dump, then restore with verification.
#[tokio::test(start_paused = true)]
async fn test_ram_backup_and_restore() {
    let save = image(32 * 1024, 42);
    let mut client = client(
        ScriptedTransport::new()
            .max_read(512)
            .reply_frame(Command::ReadHeader, &pokemon_header())
            .reply_frame(Command::ReadRam, &save)
            .reply_frame(Command::GetRamSize, &(save.len() as u32).to_be_bytes())
            .reply_frame(Command::ReadRam, &save),
    );
    client.read_header().await.unwrap();

    let mut backup = Vec::new();
    client.read_ram(&mut backup, &mut NoProgress).await.unwrap();
    assert_eq!(backup, save);

    let mut source = Cursor::new(backup);
    let report = client
        .write_ram(&mut source, save.len() as u64, true, &mut NoProgress)
        .await
        .unwrap();

    assert_eq!(report.sent, save.len() as u64);
    assert_eq!(report.verification, Some(VerifyOutcome::Match));
    assert_eq!(client.link().transport().uploaded(), &save[..]);
}

/// Test that a corrupted read-back is reported, not hidden.
#[tokio::test(start_paused = true)]
async fn test_restore_detects_corruption() {
    let save = image(8192, 1);
    let mut corrupted = save.clone();
    corrupted[100] = !corrupted[100];
    let mut client = client(
        ScriptedTransport::new()
            .reply_frame(Command::ReadHeader, &pokemon_header())
            .reply_frame(Command::GetRamSize, &8192u32.to_be_bytes())
            .reply_frame(Command::ReadRam, &corrupted),
    );
    client.read_header().await.unwrap();

    let mut source = Cursor::new(save);
    let report = client
        .write_ram(&mut source, 8192, true, &mut NoProgress)
        .await
        .unwrap();

    assert_eq!(
        report.verification,
        Some(VerifyOutcome::Mismatch {
            first_difference: 100
        })
    );
}

/// Test that a stalled transfer invalidates the session.
#[tokio::test(start_paused = true)]
async fn test_stall_clears_cartridge_info() {
    let save = image(8192, 3);
    let mut frame = build_response(&save);
    frame.truncate(3000);
    let mut client = client(
        ScriptedTransport::new()
            .reply_frame(Command::ReadHeader, &pokemon_header())
            .reply(Command::ReadRam, [Step::bytes(frame)]),
    );
    client.read_header().await.unwrap();

    let mut sink = Vec::new();
    let err = client.read_ram(&mut sink, &mut NoProgress).await.unwrap_err();
    assert!(matches!(
        err,
        LinkError::ShortRead {
            received: 2994,
            expected: 8192
        }
    ));

    let err = client.read_ram(&mut sink, &mut NoProgress).await.unwrap_err();
    assert!(matches!(err, LinkError::NoCartridge));
}

/// Test that leftovers of an aborted exchange do not leak into the next one.
#[tokio::test(start_paused = true)]
async fn test_stale_bytes_are_discarded() {
    let mut client = client(
        ScriptedTransport::new()
            .preload(Step::frame(&[0xDE, 0xAD]))
            .reply_frame(Command::GetRamSize, &2048u32.to_be_bytes()),
    );

    assert_eq!(client.ram_size().await.unwrap(), 2048);
}

/// Test Ctrl-C style cancellation of a long dump.
#[tokio::test(start_paused = true)]
async fn test_cancel_long_dump() {
    let rom = image(256 * 1024, 9);
    let mut client = client(
        ScriptedTransport::new()
            .max_read(256)
            .reply_frame(Command::ReadHeader, &pokemon_header())
            .reply(
                Command::ReadRom,
                trickle(&build_response(&rom), 1024, Duration::from_millis(50)),
            ),
    );
    client.read_header().await.unwrap();

    let token = client.cancel_token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let mut sink = Vec::new();
    let err = client.read_rom(&mut sink, &mut NoProgress).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(!sink.is_empty());
    assert!(sink.len() < rom.len());
}

/// Test recovery from a DLE followed by a wrong byte when resync is enabled.
#[tokio::test(start_paused = true)]
async fn test_resync_after_bad_stx() {
    let mut reply = vec![Step::bytes([0x10u8, 0x55])];
    reply.push(Step::frame(&4096u32.to_be_bytes()));
    let device = ScriptedTransport::new().reply(Command::GetRamSize, reply.clone());
    let mut strict = client(device);

    let err = strict.ram_size().await.unwrap_err();
    assert!(matches!(err, LinkError::NoFrameMarker));

    let config = LinkConfig::default().resync_after_bad_stx(true);
    let device = ScriptedTransport::new().reply(Command::GetRamSize, reply);
    let mut lenient = CartridgeClient::new(device, config, CancelToken::new());

    assert_eq!(lenient.ram_size().await.unwrap(), 4096);
}

/// Test loading settings from JSON.
#[test]
fn test_config_from_json() {
    let config =
        LinkConfig::from_json_str(r#"{ "timeout": 5000, "resync_after_bad_stx": true }"#).unwrap();

    assert_eq!(config.timeout, Duration::from_secs(5));
    assert!(config.resync_after_bad_stx);
    assert_eq!(config.send_chunk_size, 32);
}
