//! Conversions between domain values and the JSON wire types.

use murmur_api_types::{
    AuthorDto, FeedPageQuery, FeedPageResponse, FeedScopeParam, ProfileResponse, TweetDto,
};

use crate::application::backend::BackendError;
use crate::application::pagination::Page;
use crate::cache::FeedIdentity;
use crate::domain::entities::{Author, Profile, Tweet};
use crate::domain::types::{FeedScope, TweetId, UserId};

pub fn tweet_to_dto(tweet: &Tweet) -> TweetDto {
    TweetDto {
        id: tweet.id.to_string(),
        content: tweet.content.clone(),
        created_at: tweet.created_at,
        like_count: tweet.like_count,
        liked_by_me: tweet.liked_by_viewer,
        user: AuthorDto {
            id: tweet.author.id.to_string(),
            name: Some(tweet.author.display_name.clone()),
            image: tweet.author.image.clone(),
        },
    }
}

pub fn tweet_from_dto(dto: TweetDto) -> Tweet {
    Tweet {
        id: TweetId::new(dto.id),
        author: Author {
            id: UserId::new(dto.user.id),
            display_name: dto.user.name.unwrap_or_default(),
            image: dto.user.image,
        },
        content: dto.content,
        created_at: dto.created_at,
        like_count: dto.like_count,
        liked_by_viewer: dto.liked_by_me,
    }
}

pub fn page_to_response(page: &Page) -> FeedPageResponse {
    FeedPageResponse {
        tweets: page.tweets.iter().map(tweet_to_dto).collect(),
        next_cursor: page.next_cursor.clone(),
    }
}

pub fn page_from_response(response: FeedPageResponse) -> Page {
    Page::new(
        response.tweets.into_iter().map(tweet_from_dto).collect(),
        response.next_cursor,
    )
}

pub fn profile_to_response(profile: &Profile) -> ProfileResponse {
    ProfileResponse {
        id: profile.id.to_string(),
        name: Some(profile.display_name.clone()),
        image: profile.image.clone(),
        tweets_count: profile.tweets_count,
        followers_count: profile.followers_count,
        follows_count: profile.follows_count,
        is_following: profile.is_following,
    }
}

pub fn profile_from_response(response: ProfileResponse) -> Profile {
    Profile {
        id: UserId::new(response.id),
        display_name: response.name.unwrap_or_default(),
        image: response.image,
        tweets_count: response.tweets_count,
        followers_count: response.followers_count,
        follows_count: response.follows_count,
        is_following: response.is_following,
    }
}

pub fn identity_to_query(
    identity: &FeedIdentity,
    cursor: Option<String>,
    limit: u32,
) -> FeedPageQuery {
    let scope = match identity.scope() {
        FeedScope::All => FeedScopeParam::All,
        FeedScope::FollowingOnly => FeedScopeParam::Following,
        FeedScope::Profile => FeedScopeParam::Profile,
    };
    FeedPageQuery {
        scope,
        user_id: identity.profile_user_id().map(ToString::to_string),
        cursor,
        limit: Some(limit),
    }
}

pub fn identity_from_query(query: &FeedPageQuery) -> Result<FeedIdentity, BackendError> {
    match (query.scope, query.user_id.as_deref()) {
        (FeedScopeParam::All, _) => Ok(FeedIdentity::all()),
        (FeedScopeParam::Following, _) => Ok(FeedIdentity::following()),
        (FeedScopeParam::Profile, Some(user_id)) if !user_id.trim().is_empty() => {
            Ok(FeedIdentity::profile(user_id))
        }
        (FeedScopeParam::Profile, _) => Err(BackendError::invalid_input(
            "profile scope requires a userId",
        )),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn profile_queries_carry_the_user() {
        let query = identity_to_query(&FeedIdentity::profile("u7"), Some("c".to_string()), 5);
        assert_eq!(query.scope, FeedScopeParam::Profile);
        assert_eq!(query.user_id.as_deref(), Some("u7"));
        assert_eq!(query.limit, Some(5));

        assert_eq!(
            identity_from_query(&query).expect("valid query"),
            FeedIdentity::profile("u7")
        );
    }

    #[test]
    fn profile_scope_without_user_is_rejected() {
        let query = FeedPageQuery {
            scope: FeedScopeParam::Profile,
            user_id: None,
            cursor: None,
            limit: None,
        };
        assert!(matches!(
            identity_from_query(&query),
            Err(BackendError::InvalidInput { .. })
        ));
    }

    #[test]
    fn missing_author_name_becomes_empty() {
        let tweet = tweet_from_dto(TweetDto {
            id: "t1".to_string(),
            content: "hi".to_string(),
            created_at: datetime!(2024-01-01 00:00 UTC),
            like_count: 2,
            liked_by_me: true,
            user: AuthorDto {
                id: "u1".to_string(),
                name: None,
                image: None,
            },
        });
        assert_eq!(tweet.author.display_name, "");
        assert_eq!(tweet.like_count, 2);
        assert!(tweet.liked_by_viewer);
    }
}
