//! End-to-end pipeline test: parse a provider playlist, run the
//! transformation passes in their documented order and check the emitted
//! playlist text.

use m3u_curator::config::{Config, GroupRule};
use m3u_curator::playlist::Media;

const PLAYLIST: &str = "#EXTM3U\n\
    #EXT-X-VERSION:3\n\
    #EXTINF:0 tvg-rec=\"2\",Дождь\n\
    #EXTGRP:Прочее\n\
    http://k.prov.net/iptv/KEY/301/index.m3u8\n\
    #EXTINF:0,Euronews\n\
    #EXTGRP:Прочее\n\
    http://k.prov.net/iptv/KEY/302/index.m3u8\n\
    #EXTINF:0,Кино Плюс\n\
    #EXTGRP:Кино\n\
    http://k.prov.net/iptv/KEY/303/index.m3u8\n\
    #EXTINF:0,Арсенал\n\
    #EXTGRP:Кино\n\
    http://k.prov.net/iptv/KEY/304/index.m3u8\n\
    #EXTINF:0,Ночной\n\
    #EXTGRP:взрослые\n\
    http://k.prov.net/iptv/KEY/305/index.m3u8\n";

fn test_config() -> Config {
    Config {
        groups: vec![GroupRule {
            name: "Новости".to_string(),
            force: vec!["Дождь".to_string()],
            begin: vec!["Euronews".to_string()],
            ..Default::default()
        }],
        group_order: vec![
            "Новости".to_string(),
            "Кино HD".to_string(),
            "Кино".to_string(),
        ],
        hd_split: vec!["Кино".to_string()],
        censored_marker: Some("взрослые".to_string()),
        ..Default::default()
    }
}

fn run_pipeline(media: &mut Media, config: &Config) {
    media.apply_groups_forcing(&config.groups);
    media.sort_groups(&config.groups);
    media.validate_high_res(&config.hd_split);
    media.order_groups(&config.group_order);
}

#[test]
fn curate_flow_produces_ordered_grouped_playlist() {
    let config = test_config();
    let mut media = Media::parse(PLAYLIST).unwrap();

    // Stand in for the enrichment pass: one movie channel probes as 1080p.
    {
        let (index, _) = media.find_group("Кино").unwrap();
        let group = &mut media.groups[index];
        let (channel_index, _) = group.find_channel("Кино Плюс").unwrap();
        group.channels[channel_index].width = 1920;
        group.channels[channel_index].height = 1080;
    }

    run_pipeline(&mut media, &config);

    let out = media.to_m3u(
        Some("http://guide.example/epg.xml.gz"),
        &[],
        config.censored_marker.as_deref(),
    );

    let expected = "#EXTM3U x-tvg-url=\"http://guide.example/epg.xml.gz\"\n\
        #EXTINF:0 tvg-rec=\"0\" catchup=\"shift\" catchup-days=\"0\",Euronews\n\
        #EXTGRP:Новости\n\
        http://k.prov.net/iptv/KEY/302/index.m3u8\n\
        #EXTINF:0 tvg-rec=\"2\" catchup=\"shift\" catchup-days=\"2\",Дождь\n\
        #EXTGRP:Новости\n\
        http://k.prov.net/iptv/KEY/301/index.m3u8\n\
        #EXTINF:0 tvg-rec=\"0\" catchup=\"shift\" catchup-days=\"0\",Кино Плюс\n\
        #EXTGRP:Кино HD\n\
        http://k.prov.net/iptv/KEY/303/index.m3u8\n\
        #EXTINF:0 tvg-rec=\"0\" catchup=\"shift\" catchup-days=\"0\",Арсенал\n\
        #EXTGRP:Кино\n\
        http://k.prov.net/iptv/KEY/304/index.m3u8\n\
        #EXTINF:0 tvg-rec=\"0\" catchup=\"shift\" catchup-days=\"0\" censored=\"1\",Ночной\n\
        #EXTGRP:взрослые\n\
        http://k.prov.net/iptv/KEY/305/index.m3u8\n";

    assert_eq!(out, expected);
}

#[test]
fn skip_groups_drop_whole_groups_from_output() {
    let config = test_config();
    let mut media = Media::parse(PLAYLIST).unwrap();
    run_pipeline(&mut media, &config);

    let out = media.to_m3u(None, &["взрослые".to_string()], None);
    assert!(!out.contains("Ночной"));
    assert!(out.contains("Euronews"));
}

#[test]
fn content_before_marker_discards_the_playlist() {
    let err = Media::parse("garbage\n#EXTM3U\n#EXTINF:0,A\n#EXTGRP:G\nhttp://h/a\n");
    assert!(err.is_err());
}
