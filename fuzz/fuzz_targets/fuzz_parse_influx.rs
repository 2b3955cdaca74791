#![no_main]
use battery_reserve::series::SeriesRequest;
use battery_reserve::series::influx::parse_query_response;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };

    // Decoder must reject or accept, never panic
    let request = SeriesRequest::new(
        "daily_forecast",
        vec!["cloud_cover".to_string(), "cloud_cover_low".to_string()],
    );
    if let Ok(series) = parse_query_response(body, &request) {
        assert_eq!(series.columns().len(), 2);
    }
});
