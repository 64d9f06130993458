//! Integration tests for the asset registry

mod common;

use atlas::app_config::LimitsConfig;
use atlas::assets::{self, AssetChanges, AssetFilter, ASSET_ORDERING};
use atlas::error::AtlasError;
use atlas::geography;
use atlas::orm::geographic_areas::AdminLevel;
use atlas::orm::infrastructure_assets::{AssetCondition, AssetType};
use atlas::pagination::PageParams;
use atlas::search::Sort;
use common::{database::*, fixtures::*};
use uuid::Uuid;

#[actix_rt::test]
async fn test_asset_needs_active_area() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let (lga, _, _) = create_test_hierarchy(&db).await.unwrap();

    let err = create_test_asset(&db, Uuid::new_v4(), AssetType::Borehole, "Nowhere well")
        .await
        .unwrap_err();
    match err {
        AtlasError::Validation(fields) => assert!(fields.contains("geographic_area_id")),
        other => panic!("expected an anchor error, got {:?}", other),
    }

    geography::deactivate_area(&db, lga.id).await.unwrap();
    let err = create_test_asset(&db, lga.id, AssetType::Borehole, "Closed area well")
        .await
        .unwrap_err();
    assert!(matches!(err, AtlasError::Validation(_)));
}

#[actix_rt::test]
async fn test_update_and_move_asset() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let (lga, state, _) = create_test_hierarchy(&db).await.unwrap();
    let asset = create_test_asset(&db, lga.id, AssetType::Clinic, "Ikeja PHC")
        .await
        .unwrap();

    let updated = assets::update_asset(
        &db,
        asset.id,
        AssetChanges {
            condition: Some(AssetCondition::NonFunctional),
            official_name: Some(Some("Ikeja Primary Health Centre".to_string())),
            geographic_area_id: Some(state.id),
            ..AssetChanges::default()
        },
    )
    .await
    .expect("Failed to update asset");
    assert_eq!(updated.condition, AssetCondition::NonFunctional);
    assert_eq!(updated.geographic_area_id, state.id);
    assert_eq!(
        updated.official_name.as_deref(),
        Some("Ikeja Primary Health Centre")
    );

    let err = assets::update_asset(
        &db,
        asset.id,
        AssetChanges {
            geographic_area_id: Some(Uuid::new_v4()),
            ..AssetChanges::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AtlasError::Validation(_)));

    let view = assets::asset_view(&db, updated).await.unwrap();
    assert_eq!(view.geographic_area_name.as_deref(), Some("Lagos"));
    assert_eq!(view.condition_display, "Non-Functional");
}

#[actix_rt::test]
async fn test_delete_is_blocked_by_reports() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let (lga, _, _) = create_test_hierarchy(&db).await.unwrap();
    let asset = create_test_asset(&db, lga.id, AssetType::WaterPoint, "Market tap")
        .await
        .unwrap();
    let report = create_test_report(&db, Some(asset.id)).await.unwrap();

    let err = assets::delete_asset(&db, asset.id).await.unwrap_err();
    match err {
        AtlasError::ReferentialIntegrityViolation { entity, dependents, .. } => {
            assert_eq!(entity, "infrastructure asset");
            assert_eq!(dependents, "1 report");
        }
        other => panic!("expected a referential error, got {:?}", other),
    }

    atlas::reports::delete_report(&db, report.id).await.unwrap();
    assets::delete_asset(&db, asset.id).await.unwrap();
    assert!(matches!(
        assets::get_asset(&db, asset.id).await,
        Err(AtlasError::NotFound { .. })
    ));
}

#[actix_rt::test]
async fn test_deactivated_assets_cannot_take_reports() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let (lga, _, _) = create_test_hierarchy(&db).await.unwrap();
    let asset = create_test_asset(&db, lga.id, AssetType::Road, "Obafemi Awolowo Way")
        .await
        .unwrap();
    assets::deactivate_asset(&db, asset.id).await.unwrap();

    assert!(!assets::exists_and_active(&db, asset.id).await.unwrap());
    let err = create_test_report(&db, Some(asset.id)).await.unwrap_err();
    assert!(matches!(err, AtlasError::Validation(_)));
}

#[actix_rt::test]
async fn test_list_filters_and_stats() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let (lga, _, _) = create_test_hierarchy(&db).await.unwrap();
    let mut kenya = new_area("Kenya", AdminLevel::Country, None);
    kenya.country_code = "KE".to_string();
    let kenya = geography::create_area(&db, kenya).await.unwrap();

    create_test_asset(&db, lga.id, AssetType::School, "Ikeja Grammar")
        .await
        .unwrap();
    create_test_asset(&db, lga.id, AssetType::School, "Ikeja Girls")
        .await
        .unwrap();
    let mut verified = new_asset(kenya.id, AssetType::Borehole, "Kibera borehole");
    verified.is_verified = true;
    verified.condition = AssetCondition::Functional;
    assets::create_asset(&db, verified).await.unwrap();
    let retired = create_test_asset(&db, lga.id, AssetType::Market, "Old market")
        .await
        .unwrap();
    assets::deactivate_asset(&db, retired.id).await.unwrap();

    let stats = assets::asset_stats(&db, &AssetFilter::default()).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.verified, 1);
    assert_eq!(stats.by_type.get("school"), Some(&2));
    assert_eq!(stats.by_type.get("borehole"), Some(&1));
    assert_eq!(stats.by_type.get("market"), None);
    assert_eq!(stats.by_condition.get("unknown"), Some(&2));

    let nigeria = AssetFilter {
        country_code: Some("ng".to_string()),
        ..AssetFilter::default()
    };
    let page = assets::list_assets(&db, &nigeria, &PageParams::default(), &LimitsConfig::default())
        .await
        .unwrap();
    assert_eq!(page.count, 2);
    let stats = assets::asset_stats(&db, &nigeria).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_type.get("school"), Some(&2));

    let paged = assets::list_assets(
        &db,
        &AssetFilter::default(),
        &PageParams::new(2, 2),
        &LimitsConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(paged.count, 3);
    assert_eq!(paged.results.len(), 1);

    let collection = assets::assets_geojson(&db, &AssetFilter::default())
        .await
        .unwrap();
    assert_eq!(collection.features.len(), 3);
}

#[test]
fn test_asset_type_catalogue() {
    let types = assets::asset_types();
    assert!(types.iter().any(|c| c.value == "water_point" && c.label == "Water Point"));
    assert_eq!(types.len(), 12);
}

#[actix_rt::test]
async fn test_search_and_ordering() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let (lga, _, _) = create_test_hierarchy(&db).await.unwrap();

    let mut school = new_asset(lga.id, AssetType::School, "Ikeja Grammar");
    school.description = "Secondary school near the market".to_string();
    let school = assets::create_asset(&db, school).await.unwrap();
    let mut borehole = new_asset(lga.id, AssetType::Borehole, "Oba well");
    borehole.official_name = Some("Ikeja Borehole KB-1".to_string());
    let borehole = assets::create_asset(&db, borehole).await.unwrap();

    let limits = LimitsConfig::default();
    let search = |term: &str| AssetFilter {
        search: Some(term.to_string()),
        ..AssetFilter::default()
    };

    let page = assets::list_assets(&db, &search("GRAMMAR"), &PageParams::default(), &limits)
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, school.id);

    let page = assets::list_assets(&db, &search("kb-1"), &PageParams::default(), &limits)
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, borehole.id);

    let page = assets::list_assets(&db, &search("market"), &PageParams::default(), &limits)
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, school.id);

    let page = assets::list_assets(&db, &search("ikeja"), &PageParams::default(), &limits)
        .await
        .unwrap();
    assert_eq!(page.count, 2);

    // Wildcards in the term are matched literally.
    let page = assets::list_assets(&db, &search("%"), &PageParams::default(), &limits)
        .await
        .unwrap();
    assert_eq!(page.count, 0);

    let by_type = AssetFilter {
        ordering: Sort::parse("asset_type", ASSET_ORDERING),
        ..AssetFilter::default()
    };
    let page = assets::list_assets(&db, &by_type, &PageParams::default(), &limits)
        .await
        .unwrap();
    let ids: Vec<_> = page.results.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![borehole.id, school.id]);

    let by_type_desc = AssetFilter {
        ordering: Sort::parse("-asset_type", ASSET_ORDERING),
        ..AssetFilter::default()
    };
    let page = assets::list_assets(&db, &by_type_desc, &PageParams::default(), &limits)
        .await
        .unwrap();
    let ids: Vec<_> = page.results.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![school.id, borehole.id]);
}
