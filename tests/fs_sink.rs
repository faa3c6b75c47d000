use matchvision::insights::artifact::HeatmapKind;
use matchvision::insights::{
    Artifact, FsSink, InsightsArtifacts, InsightsGenerator, BALL_POSSESSION_FILE, PLAYER_POSSESSION_FILE,
    PLAYER_SPEED_FILE, TEAM1_HEATMAP_FILE, TEAM2_HEATMAP_FILE,
};
use matchvision::{BBox, Category, PossessionKey, Team, TrackStore};

fn store() -> TrackStore {
    let mut store = TrackStore::new(4);
    for f in 0..4 {
        let x = 10.0 * f as f32;
        store.insert(Category::Players, f, 5, BBox::ltrb(x, 0.0, x + 10.0, 30.0));
        store.insert(Category::Players, f, 8, BBox::ltrb(100.0, 0.0, 110.0, 30.0));
    }
    store.teams_mut().assign(5, Team::One);
    store.teams_mut().assign(8, Team::Two);
    store.possession_mut().set(0, 5);
    store.possession_mut().set(1, 5);
    store.possession_mut().set(2, 8);
    store
}

#[test]
fn test_fs_sink_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let insights_dir = dir.path().join("output").join("insights");
    let possession = vec![Some(Team::One), Some(Team::One), Some(Team::Two), None];

    let mut sink = FsSink::new(&insights_dir);
    let bundle = InsightsGenerator::default()
        .generate_all(&store(), &possession, 2.0, &mut sink)
        .unwrap();

    for name in [BALL_POSSESSION_FILE, PLAYER_POSSESSION_FILE, PLAYER_SPEED_FILE, TEAM1_HEATMAP_FILE, TEAM2_HEATMAP_FILE] {
        assert!(insights_dir.join(name).is_file(), "{} missing", name);
    }

    let csv = std::fs::read_to_string(insights_dir.join(PLAYER_POSSESSION_FILE)).unwrap();
    assert_eq!(csv, "Player ID,Possession Time (s)\n5,1\n8,0.5\n");

    let artifacts = InsightsArtifacts::open(&insights_dir);

    let ball = artifacts.ball_possession().unwrap().available().unwrap();
    assert_eq!(ball, bundle.ball_possession);
    assert_eq!(ball[&PossessionKey::NoPossession], 25.0);

    let team = artifacts.team_possession().unwrap().available().unwrap();
    assert_eq!(team[&PossessionKey::Team(Team::One)], 1.0);

    let speed = artifacts.player_speed().unwrap().available().unwrap();
    assert_eq!(speed.keys().copied().collect::<Vec<_>>(), vec![5, 8]);
    assert!((speed[&5] - bundle.player_speed[&5]).abs() < 1e-9);

    let heatmap = artifacts.heatmap(HeatmapKind::Team1).unwrap().available().unwrap();
    assert_eq!(heatmap.dimensions(), (500, 500));
}

#[test]
fn test_artifacts_before_any_run() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = InsightsArtifacts::open(dir.path().join("insights"));

    match artifacts.player_possession().unwrap() {
        Artifact::NotAvailable(path) => assert!(path.ends_with(PLAYER_POSSESSION_FILE)),
        Artifact::Available(_) => panic!("nothing was written yet"),
    }
    assert!(!artifacts.heatmap(HeatmapKind::AllPlayers).unwrap().is_available());
}
