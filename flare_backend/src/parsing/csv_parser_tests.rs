#[cfg(test)]
mod tests {
    use crate::parsing::csv_parser::{
        dataframe_to_observations, parse_observations_csv, parse_observations_csv_to_records,
        parse_timestamp,
    };
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "id,lat_gmtco,lon_gmtco,date_mscan,temp_bb,radiant_heat_intensity,radiant_heat,area_bb,sample_m10\n";

    /// Helper to create a temp CSV file
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", content).unwrap();
        temp_file
    }

    #[test]
    fn test_parse_observations_csv_basic() {
        let csv_content = format!(
            "{}1,31.5,47.2,2017/03/01 10:20:30.125,1520.5,4.2,1.1,0.002,3\n2,31.6,47.3,2017/03/05 11:00:00,1401,3.9,0.9,0.001,4\n",
            HEADER
        );

        let temp_file = create_temp_csv(&csv_content);
        let df = parse_observations_csv(temp_file.path()).unwrap();
        assert_eq!(df.height(), 2);

        // Integer-looking column is widened to Float64
        assert!(df.column("sample_m10").unwrap().f64().is_ok());
    }

    #[test]
    fn test_records_keep_all_fields() {
        let csv_content = format!(
            "{}7,31.5,47.2,2017/03/01 10:20:30.125,1520.5,4.2,1.1,0.002,3\n",
            HEADER
        );

        let temp_file = create_temp_csv(&csv_content);
        let records = parse_observations_csv_to_records(temp_file.path()).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, 7);
        assert_eq!(record.lat_gmtco, Some(31.5));
        assert_eq!(record.lon_gmtco, Some(47.2));
        assert_eq!(record.temp_bb, Some(1520.5));
        assert_eq!(record.sample_m10, Some(3.0));
        assert_eq!(
            record.date_mscan,
            NaiveDate::from_ymd_opt(2017, 3, 1).and_then(|d| d.and_hms_milli_opt(10, 20, 30, 125))
        );
    }

    #[test]
    fn test_missing_values_are_kept_as_none() {
        let csv_content = format!("{}1,,47.2,2017-03-01 00:00:00,,4.2,1.1,0.002,3\n", HEADER);

        let temp_file = create_temp_csv(&csv_content);
        let records = parse_observations_csv_to_records(temp_file.path()).unwrap();

        assert_eq!(records[0].lat_gmtco, None);
        assert_eq!(records[0].temp_bb, None);
        assert!(records[0].date_mscan.is_some());
    }

    #[test]
    fn test_unparseable_timestamp_keeps_source_text() {
        let csv_content = format!(
            "{}1,31.5,47.2,yesterday,1500,4.2,1.1,0.002,3\n\
             2,31.5,47.2,,1500,4.2,1.1,0.002,3\n\
             3,31.5,47.2,2017/03/01 10:20:30,1500,4.2,1.1,0.002,3\n",
            HEADER
        );

        let temp_file = create_temp_csv(&csv_content);
        let records = parse_observations_csv_to_records(temp_file.path()).unwrap();
        assert_eq!(records[0].date_mscan, None);
        assert_eq!(records[0].date_mscan_text.as_deref(), Some("yesterday"));
        assert_eq!(records[1].date_mscan, None);
        assert_eq!(records[1].date_mscan_text, None);
        assert!(records[2].date_mscan.is_some());
        assert_eq!(records[2].date_mscan_text, None);
    }

    #[test]
    fn test_unnamed_index_column_used_as_id() {
        let csv_content = "Unnamed: 0,lat_gmtco,lon_gmtco,date_mscan,temp_bb,radiant_heat_intensity,radiant_heat,area_bb,sample_m10\n\
                           42,31.5,47.2,2017/03/01 10:00:00,1500,4.2,1.1,0.002,3\n";

        let temp_file = create_temp_csv(csv_content);
        let records = parse_observations_csv_to_records(temp_file.path()).unwrap();
        assert_eq!(records[0].id, 42);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let csv_content = format!(
            "{}1,31.5,47.2,2017/03/01 10:00:00,1500,4.2,1.1,0.002,3\n1,31.6,47.3,2017/03/02 10:00:00,1500,4.2,1.1,0.002,3\n",
            HEADER
        );

        let temp_file = create_temp_csv(&csv_content);
        let result = parse_observations_csv_to_records(temp_file.path());
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("Duplicate observation id 1"));
    }

    #[test]
    fn test_missing_column_rejected() {
        let temp_file = create_temp_csv("id,lat_gmtco,lon_gmtco\n1,31.5,47.2\n");
        let result = parse_observations_csv(temp_file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("missing column"));
    }

    #[test]
    fn test_dataframe_to_observations_empty() {
        let csv_content = HEADER.to_string();
        let temp_file = create_temp_csv(&csv_content);
        let df = parse_observations_csv(temp_file.path()).unwrap();
        let records = dataframe_to_observations(&df).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2017, 6, 30).and_then(|d| d.and_hms_opt(23, 59, 1));

        assert_eq!(parse_timestamp("2017/06/30 23:59:01"), expected);
        assert_eq!(parse_timestamp("2017-06-30 23:59:01"), expected);
        assert_eq!(parse_timestamp("2017-06-30T23:59:01Z"), expected);
        assert_eq!(parse_timestamp("2017-07-01T01:59:01+02:00"), expected);
        assert_eq!(
            parse_timestamp("2017-06-30"),
            NaiveDate::from_ymd_opt(2017, 6, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("30/06/2017"), None);
    }
}
