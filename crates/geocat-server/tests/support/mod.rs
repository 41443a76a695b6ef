//! Shared test support: an in-memory `CatalogStorage` stub and helpers to
//! stand up the router against it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use geocat_core::{
    AdminAreaFeature, AdminDivision, BoundingBox, DivisionRef, Document, DocumentRef,
    DocumentSummary, EntityRef, LocatedPlace, LonLat, PointDetail, PointFeature, PointGeometry,
    PointSummary, SiteEpoch, SiteType,
};
use geocat_storage::{
    CatalogStorage, NewDocument, NewPoint, NewSiteEpoch, NewSiteType, Page, PageParams,
    StorageError,
};

use geocat_server::cache::{CacheBackend, CacheTtls, CatalogCache};
use geocat_server::{AppConfig, AppState, AuthConfig, AuthService, build_router};

#[derive(Debug, Clone)]
struct StoredPoint {
    detail: NewPoint,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    types: HashMap<i32, SiteType>,
    epochs: HashMap<i32, SiteEpoch>,
    divisions: HashMap<i32, AdminDivision>,
    area_features: Vec<AdminAreaFeature>,
    points: HashMap<i32, StoredPoint>,
    point_documents: HashMap<i32, Vec<i32>>,
    documents: HashMap<i32, Document>,
    located: Option<LocatedPlace>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory catalog storage for tests.
pub struct MemoryCatalog {
    inner: Mutex<Tables>,
}

impl MemoryCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Tables::default()),
        })
    }

    pub fn seed_type(&self, type_value: &str, label: &str) -> SiteType {
        let mut t = self.inner.lock().unwrap();
        let id = t.next_id();
        let site_type = SiteType {
            id,
            type_value: type_value.into(),
            label: Some(label.into()),
        };
        t.types.insert(id, site_type.clone());
        site_type
    }

    pub fn seed_epoch(&self, epoch_value: &str, label: &str) -> SiteEpoch {
        let mut t = self.inner.lock().unwrap();
        let id = t.next_id();
        let epoch = SiteEpoch {
            id,
            epoch_value: epoch_value.into(),
            label: Some(label.into()),
        };
        t.epochs.insert(id, epoch.clone());
        epoch
    }

    pub fn seed_division(&self, name: &str) -> AdminDivision {
        let mut t = self.inner.lock().unwrap();
        let id = t.next_id();
        let division = AdminDivision {
            id,
            name: Some(name.into()),
        };
        t.divisions.insert(id, division.clone());
        division
    }

    pub fn seed_area_feature(&self, id: i32, name: &str, geometry: serde_json::Value) {
        let mut t = self.inner.lock().unwrap();
        t.area_features.push(AdminAreaFeature {
            id,
            name: Some(name.into()),
            geometry,
        });
    }

    pub fn set_located(&self, place: Option<LocatedPlace>) {
        self.inner.lock().unwrap().located = place;
    }

    fn build_detail(t: &Tables, id: i32, stored: &StoredPoint) -> PointDetail {
        let new = &stored.detail;
        let site_type = t.types.get(&new.type_id).map(|ty| EntityRef {
            id: ty.id,
            label: ty.label.clone(),
        });
        let epoch = t.epochs.get(&new.epoch_id).map(|e| EntityRef {
            id: e.id,
            label: e.label.clone(),
        });
        let admin_division = new
            .admin_division_id
            .and_then(|d| t.divisions.get(&d))
            .map(|d| DivisionRef {
                id: d.id,
                name: d.name.clone(),
            });
        let documents = t
            .point_documents
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|doc_id| t.documents.get(doc_id))
                    .map(|doc| DocumentRef {
                        id: doc.id,
                        filename: doc.filename.clone(),
                        description: doc.description.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        PointDetail {
            id,
            name: new.name.clone(),
            short_description: new.short_description.clone(),
            description: new.description.clone(),
            longitude: new.longitude,
            latitude: new.latitude,
            site_type,
            epoch,
            admin_division,
            documents,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }

    fn validate_point_refs(t: &Tables, new: &NewPoint) -> Result<(), StorageError> {
        if !t.types.contains_key(&new.type_id)
            || !t.epochs.contains_key(&new.epoch_id)
            || new
                .admin_division_id
                .is_some_and(|d| !t.divisions.contains_key(&d))
            || new.document_ids.as_ref().is_some_and(|ids| {
                ids.iter().any(|doc_id| !t.documents.contains_key(doc_id))
            })
        {
            return Err(StorageError::invalid_input(
                "referenced type, epoch, division or document does not exist",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStorage for MemoryCatalog {
    async fn list_site_types(&self) -> Result<Vec<SiteType>, StorageError> {
        let t = self.inner.lock().unwrap();
        let mut types: Vec<_> = t.types.values().cloned().collect();
        types.sort_by_key(|ty| ty.id);
        Ok(types)
    }

    async fn create_site_type(&self, new: &NewSiteType) -> Result<SiteType, StorageError> {
        let mut t = self.inner.lock().unwrap();
        if t.types.values().any(|ty| ty.type_value == new.type_value) {
            return Err(StorageError::already_exists("site type", &new.type_value));
        }
        let id = t.next_id();
        let site_type = SiteType {
            id,
            type_value: new.type_value.clone(),
            label: new.label.clone(),
        };
        t.types.insert(id, site_type.clone());
        Ok(site_type)
    }

    async fn update_site_type(
        &self,
        id: i32,
        new: &NewSiteType,
    ) -> Result<SiteType, StorageError> {
        let mut t = self.inner.lock().unwrap();
        if t.types
            .values()
            .any(|ty| ty.id != id && ty.type_value == new.type_value)
        {
            return Err(StorageError::already_exists("site type", &new.type_value));
        }
        match t.types.get_mut(&id) {
            Some(ty) => {
                ty.type_value = new.type_value.clone();
                ty.label = new.label.clone();
                Ok(ty.clone())
            }
            None => Err(StorageError::not_found("site type", i64::from(id))),
        }
    }

    async fn delete_site_type(&self, id: i32) -> Result<(), StorageError> {
        let mut t = self.inner.lock().unwrap();
        let references = t
            .points
            .values()
            .filter(|p| p.detail.type_id == id)
            .count() as i64;
        if references > 0 {
            return Err(StorageError::in_use("site type", i64::from(id), references));
        }
        t.types
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("site type", i64::from(id)))
    }

    async fn list_site_epochs(&self) -> Result<Vec<SiteEpoch>, StorageError> {
        let t = self.inner.lock().unwrap();
        let mut epochs: Vec<_> = t.epochs.values().cloned().collect();
        epochs.sort_by_key(|e| e.id);
        Ok(epochs)
    }

    async fn create_site_epoch(&self, new: &NewSiteEpoch) -> Result<SiteEpoch, StorageError> {
        let mut t = self.inner.lock().unwrap();
        if t.epochs.values().any(|e| e.epoch_value == new.epoch_value) {
            return Err(StorageError::already_exists("site epoch", &new.epoch_value));
        }
        let id = t.next_id();
        let epoch = SiteEpoch {
            id,
            epoch_value: new.epoch_value.clone(),
            label: new.label.clone(),
        };
        t.epochs.insert(id, epoch.clone());
        Ok(epoch)
    }

    async fn update_site_epoch(
        &self,
        id: i32,
        new: &NewSiteEpoch,
    ) -> Result<SiteEpoch, StorageError> {
        let mut t = self.inner.lock().unwrap();
        if t.epochs
            .values()
            .any(|e| e.id != id && e.epoch_value == new.epoch_value)
        {
            return Err(StorageError::already_exists("site epoch", &new.epoch_value));
        }
        match t.epochs.get_mut(&id) {
            Some(e) => {
                e.epoch_value = new.epoch_value.clone();
                e.label = new.label.clone();
                Ok(e.clone())
            }
            None => Err(StorageError::not_found("site epoch", i64::from(id))),
        }
    }

    async fn delete_site_epoch(&self, id: i32) -> Result<(), StorageError> {
        let mut t = self.inner.lock().unwrap();
        let references = t
            .points
            .values()
            .filter(|p| p.detail.epoch_id == id)
            .count() as i64;
        if references > 0 {
            return Err(StorageError::in_use(
                "site epoch",
                i64::from(id),
                references,
            ));
        }
        t.epochs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("site epoch", i64::from(id)))
    }

    async fn list_admin_divisions(&self) -> Result<Vec<AdminDivision>, StorageError> {
        let t = self.inner.lock().unwrap();
        let mut divisions: Vec<_> = t.divisions.values().cloned().collect();
        divisions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(divisions)
    }

    async fn admin_areas_in_bbox(
        &self,
        _bbox: &BoundingBox,
    ) -> Result<Vec<AdminAreaFeature>, StorageError> {
        Ok(self.inner.lock().unwrap().area_features.clone())
    }

    async fn point_geometries(&self) -> Result<Vec<PointGeometry>, StorageError> {
        let t = self.inner.lock().unwrap();
        Ok(t.points
            .values()
            .map(|p| PointGeometry {
                geom: json!({
                    "type": "Point",
                    "coordinates": [p.detail.longitude, p.detail.latitude],
                }),
            })
            .collect())
    }

    async fn points_in_bbox(&self, bbox: &BoundingBox) -> Result<Vec<PointFeature>, StorageError> {
        let t = self.inner.lock().unwrap();
        let mut features: Vec<_> = t
            .points
            .iter()
            .filter(|(_, p)| {
                p.detail.longitude >= bbox.lon_min
                    && p.detail.longitude <= bbox.lon_max
                    && p.detail.latitude >= bbox.lat_min
                    && p.detail.latitude <= bbox.lat_max
            })
            .map(|(id, p)| PointFeature {
                id: *id,
                name: p.detail.name.clone(),
                type_id: p.detail.type_id,
                epoch_id: p.detail.epoch_id,
                geometry: json!({
                    "type": "Point",
                    "coordinates": [p.detail.longitude, p.detail.latitude],
                }),
            })
            .collect();
        features.sort_by_key(|f| f.id);
        Ok(features)
    }

    async fn get_point(&self, id: i32) -> Result<Option<PointDetail>, StorageError> {
        let t = self.inner.lock().unwrap();
        Ok(t.points.get(&id).map(|p| Self::build_detail(&t, id, p)))
    }

    async fn list_points(&self, params: &PageParams) -> Result<Page<PointSummary>, StorageError> {
        let t = self.inner.lock().unwrap();
        let mut ids: Vec<_> = t.points.keys().copied().collect();
        ids.sort_unstable();
        let total = ids.len() as i64;
        let items = ids
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .map(|id| {
                let detail = Self::build_detail(&t, id, &t.points[&id]);
                PointSummary {
                    id: detail.id,
                    name: detail.name,
                    short_description: detail.short_description,
                    longitude: detail.longitude,
                    latitude: detail.latitude,
                    site_type: detail.site_type,
                    epoch: detail.epoch,
                    admin_division: detail.admin_division,
                    created_at: detail.created_at,
                    updated_at: detail.updated_at,
                }
            })
            .collect();
        Ok(Page::new(items, total, params))
    }

    async fn create_point(&self, new: &NewPoint) -> Result<PointDetail, StorageError> {
        let mut t = self.inner.lock().unwrap();
        Self::validate_point_refs(&t, new)?;
        let id = t.next_id();
        let now = Utc::now();
        t.points.insert(
            id,
            StoredPoint {
                detail: new.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        if let Some(ref doc_ids) = new.document_ids {
            t.point_documents.insert(id, doc_ids.clone());
        }
        Ok(Self::build_detail(&t, id, &t.points[&id]))
    }

    async fn update_point(&self, id: i32, new: &NewPoint) -> Result<PointDetail, StorageError> {
        let mut t = self.inner.lock().unwrap();
        if !t.points.contains_key(&id) {
            return Err(StorageError::not_found("point", i64::from(id)));
        }
        Self::validate_point_refs(&t, new)?;
        let stored = t.points.get_mut(&id).unwrap();
        stored.detail = new.clone();
        stored.updated_at = Utc::now();
        if let Some(ref doc_ids) = new.document_ids {
            t.point_documents.insert(id, doc_ids.clone());
        }
        Ok(Self::build_detail(&t, id, &t.points[&id]))
    }

    async fn delete_point(&self, id: i32) -> Result<(), StorageError> {
        let mut t = self.inner.lock().unwrap();
        t.point_documents.remove(&id);
        t.points
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("point", i64::from(id)))
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StorageError> {
        let t = self.inner.lock().unwrap();
        let mut documents: Vec<_> = t.documents.values().cloned().collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(documents
            .into_iter()
            .map(|d| DocumentSummary {
                id: d.id,
                filename: d.filename,
                description: d.description,
                size: d.size,
                mimetype: d.mimetype,
                created_at: d.created_at,
            })
            .collect())
    }

    async fn create_document(&self, new: &NewDocument) -> Result<Document, StorageError> {
        let mut t = self.inner.lock().unwrap();
        if t.documents.values().any(|d| d.filepath == new.filepath) {
            return Err(StorageError::already_exists("document", &new.filepath));
        }
        let id = t.next_id();
        let now = Utc::now();
        let document = Document {
            id,
            filename: new.filename.clone(),
            filepath: new.filepath.clone(),
            mimetype: new.mimetype.clone(),
            size: new.size,
            description: new.description.clone(),
            created_at: now,
            updated_at: now,
        };
        t.documents.insert(id, document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: i32) -> Result<Option<Document>, StorageError> {
        Ok(self.inner.lock().unwrap().documents.get(&id).cloned())
    }

    async fn delete_document(&self, id: i32) -> Result<Document, StorageError> {
        let mut t = self.inner.lock().unwrap();
        for links in t.point_documents.values_mut() {
            links.retain(|doc_id| *doc_id != id);
        }
        t.documents
            .remove(&id)
            .ok_or_else(|| StorageError::not_found("document", i64::from(id)))
    }

    async fn locate(&self, _at: LonLat) -> Result<Option<LocatedPlace>, StorageError> {
        Ok(self.inner.lock().unwrap().located.clone())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

// ==================== App wiring helpers ====================

pub const TEST_USERNAME: &str = "admin";
pub const TEST_PASSWORD: &str = "correct horse battery staple";
pub const TEST_JWT_SECRET: &str = "0123456789abcdef0123456789abcdef";

pub fn test_auth_config(enabled: bool) -> AuthConfig {
    use argon2::password_hash::{SaltString, rand_core::OsRng};
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(TEST_PASSWORD.as_bytes(), &salt)
        .unwrap()
        .to_string();
    AuthConfig {
        enabled,
        username: TEST_USERNAME.into(),
        password_hash: hash,
        jwt_secret: TEST_JWT_SECRET.into(),
        token_ttl_secs: 3600,
    }
}

pub struct TestApp {
    pub base: String,
    pub storage: Arc<MemoryCatalog>,
    pub cache: Arc<CatalogCache>,
    pub client: reqwest::Client,
    // Held for the lifetime of the app so uploads have somewhere to live.
    pub upload_dir: tempfile::TempDir,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Binds the router against the in-memory catalog on an ephemeral port.
pub async fn spawn_app(storage: Arc<MemoryCatalog>, auth_enabled: bool) -> TestApp {
    let upload_dir = tempfile::tempdir().expect("create upload dir");

    let mut cfg = AppConfig::default();
    cfg.auth = test_auth_config(auth_enabled);
    cfg.uploads.dir = upload_dir.path().to_path_buf();

    let cache = Arc::new(CatalogCache::new(
        CacheBackend::new_local(),
        CacheTtls::default(),
    ));

    let state = AppState {
        storage: storage.clone(),
        cache: cache.clone(),
        auth: Arc::new(AuthService::new(cfg.auth.clone())),
        uploads: cfg.uploads.clone(),
    };

    let app = build_router(state, &cfg);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    TestApp {
        base: format!("http://{addr}"),
        storage,
        cache,
        client: reqwest::Client::new(),
        upload_dir,
        shutdown: Some(tx),
    }
}

impl TestApp {
    /// Logs in with the test credentials and returns the bearer token.
    pub async fn login(&self) -> String {
        let resp = self
            .client
            .post(format!("{}/api/auth/login", self.base))
            .json(&json!({ "username": TEST_USERNAME, "password": TEST_PASSWORD }))
            .send()
            .await
            .expect("login request");
        assert!(resp.status().is_success(), "login failed: {}", resp.status());
        let body: serde_json::Value = resp.json().await.unwrap();
        body["token"].as_str().expect("token in response").to_string()
    }
}
