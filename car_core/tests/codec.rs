use car_core::ErrorVariant;
use car_core::protocol::{
    Command, Direction, ErrorResponse, Frame, Payload, StartArgs, decode, encode,
};
use rstest::rstest;

#[rstest]
#[case::empty_line("", 0)]
#[case::unknown_prefix("!PING${}${\"time\": 1.0}", 0)]
#[case::prefix_checked_before_command("!nope", 0)]
#[case::lowercase_command("?ping${\"time\": 1.0}${\"time\": 1.0}", 1)]
#[case::unknown_command("?JUMP${}${\"time\": 1.0}", 1)]
#[case::command_checked_before_separators("?JUMP", 1)]
#[case::no_separator("?PING", 2)]
#[case::one_segment("?STOP${}", 2)]
#[case::three_segments("?STOP${}${}${}", 2)]
#[case::broken_payload("?START${\"distance\": ${\"time\": 1.0}", 3)]
#[case::empty_payload("?STOP$${\"time\": 1.0}", 3)]
#[case::payload_checked_before_metadata("?START${bad$bad", 3)]
#[case::missing_time("?STOP${}${}", 4)]
#[case::non_numeric_time("?STOP${}${\"time\": \"noon\"}", 4)]
#[case::metadata_not_object("?STOP${}$[1.0]", 4)]
#[case::negative_time("?STOP${}${\"time\": -5.0}", 4)]
#[case::request_type_error("?START${\"distance\": true, \"reverse_brake\": false}${\"time\": 1.0}", 5)]
#[case::negative_distance("?START${\"distance\": -2.5, \"reverse_brake\": false}${\"time\": 1.0}", 5)]
#[case::type_checked_before_metadata("?START${\"distance\": \"x\"}$garbage", 5)]
#[case::embedded_carriage_return("?STOP${}\r${\"time\": 1.0}", 6)]
#[case::bad_prefix_wins_over_carriage_return("X\rfoo", 0)]
#[case::bad_command_wins_over_carriage_return("?JU\rMP${}${\"time\": 1.0}", 1)]
#[case::missing_segment_wins_over_carriage_return("?STOP${}\r\r", 2)]
#[case::embedded_newline("?STATUS${}${\"time\":\n 1.0}", 6)]
#[case::response_type_error("~STATUS${\"running\": 3}${\"time\": 1.0}", 10)]
fn first_failing_rule_decides_the_code(#[case] line: &str, #[case] code: u8) {
    let err = decode(line).unwrap_err();
    assert_eq!(err.code(), code, "{line:?} -> {err}");
}

#[rstest]
#[case("\n")]
#[case("\r\n")]
#[case("\r")]
#[case("")]
fn one_trailing_terminator_is_accepted(#[case] end: &str) {
    let line = format!("?STATUS${{}}${{\"time\": 3.5}}{end}");
    let f = decode(&line).unwrap();
    assert_eq!(f, Frame::request(Command::Status, Payload::Empty, 3.5));
}

#[test]
fn any_json_spacing_decodes() {
    let f = decode("?START${\"distance\":100,\"reverse_brake\":true}${ \"time\" :1}").unwrap();
    assert_eq!(
        f.payload,
        Payload::Start(StartArgs {
            distance: 100.0,
            reverse_brake: true
        })
    );
    assert_eq!(f.metadata.time, 1.0);
}

#[test]
fn error_message_with_separator_survives_the_wire() {
    let f = Frame::response(
        Command::Error,
        Payload::Error(ErrorResponse {
            error_variant: 99,
            message: "relay $2 stuck".into(),
        }),
        10.0,
    );
    let line = encode(&f).unwrap();
    assert_eq!(line.matches('$').count(), 2, "{line}");
    assert!(!line.contains("relay $"), "{line}");
    assert_eq!(decode(&line).unwrap(), f);
}

#[test]
fn error_frames_carry_the_console_text() {
    let err = decode("?JUMP${}${\"time\": 1.0}").unwrap_err();
    let line = encode(&Frame::error(&err, 7.0)).unwrap();
    assert!(
        line.starts_with(
            r#"~ERROR${"error_variant": 1, "message": "Malformed request - Failed command parsing: "#
        ),
        "{line}"
    );
    assert!(line.ends_with(r#"${"time": 7.0}"#));
}

#[test]
fn start_response_is_an_empty_object() {
    let f = Frame::response(Command::Start, Payload::Empty, 2.0);
    assert_eq!(encode(&f).unwrap(), r#"~START${}${"time": 2.0}"#);
    assert_eq!(decode("~START${}${\"time\": 2.0}").unwrap().direction, Direction::Response);
}

#[test]
fn encoding_rejects_bad_metadata() {
    let f = Frame::request(Command::Stop, Payload::Empty, f64::NAN);
    assert_eq!(
        encode(&f).unwrap_err().variant,
        ErrorVariant::FailedMetadataParsing
    );
}
